//! Lenient deserializers for fields the API sends with inconsistent types.

use serde::de;

// Amounts arrive as numbers or as numeric strings ("123.45")
pub(crate) fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct AmountVisitor;

    impl<'de> de::Visitor<'de> for AmountVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a number or numeric string")
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v as f64)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v as f64)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(0.0)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(0.0)
        }
    }

    deserializer.deserialize_any(AmountVisitor)
}

// IDs are usually strings but some endpoints return integers
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct IdVisitor;

    impl<'de> de::Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or integer id")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "deserialize_id")]
        id: String,
        #[serde(default, deserialize_with = "deserialize_amount")]
        valor: f64,
    }

    #[test]
    fn test_amount_from_number_and_string() {
        let a: Sample = serde_json::from_str(r#"{"id": "a", "valor": 12.5}"#).unwrap();
        assert_eq!(a.valor, 12.5);
        let b: Sample = serde_json::from_str(r#"{"id": "b", "valor": "99.90"}"#).unwrap();
        assert_eq!(b.valor, 99.9);
        let c: Sample = serde_json::from_str(r#"{"id": "c", "valor": 7}"#).unwrap();
        assert_eq!(c.valor, 7.0);
        let d: Sample = serde_json::from_str(r#"{"id": "d", "valor": null}"#).unwrap();
        assert_eq!(d.valor, 0.0);
        let e: Sample = serde_json::from_str(r#"{"id": "e"}"#).unwrap();
        assert_eq!(e.valor, 0.0);
    }

    #[test]
    fn test_amount_rejects_garbage() {
        assert!(serde_json::from_str::<Sample>(r#"{"id": "a", "valor": "abc"}"#).is_err());
    }

    #[test]
    fn test_id_from_number() {
        let s: Sample = serde_json::from_str(r#"{"id": 42, "valor": 0}"#).unwrap();
        assert_eq!(s.id, "42");
    }
}
