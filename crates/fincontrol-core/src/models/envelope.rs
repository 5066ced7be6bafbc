use serde::{Deserialize, Serialize};

use super::de::deserialize_amount;

/// Response wrapper used by most endpoints: `{ "success": true, "data": ... }`.
///
/// Some endpoints return the payload bare, so the wrapper is optional when
/// decoding through [`Envelope::into_data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped {
        #[serde(default)]
        success: Option<bool>,
        data: T,
    },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> T {
        match self {
            Envelope::Wrapped { data, .. } => data,
            Envelope::Bare(data) => data,
        }
    }
}

/// Monthly total response: `{ "success": true, "total": 1234.5 }`
#[derive(Debug, Clone, Deserialize)]
pub struct TotalResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub total: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: String,
    }

    #[test]
    fn test_wrapped_and_bare() {
        let wrapped: Envelope<Vec<Item>> =
            serde_json::from_str(r#"{"success": true, "data": [{"id": "1"}]}"#).unwrap();
        assert_eq!(wrapped.into_data(), vec![Item { id: "1".into() }]);

        let bare: Envelope<Vec<Item>> = serde_json::from_str(r#"[{"id": "2"}]"#).unwrap();
        assert_eq!(bare.into_data(), vec![Item { id: "2".into() }]);
    }

    #[test]
    fn test_total_response() {
        let total: TotalResponse =
            serde_json::from_str(r#"{"success": true, "total": "150.25"}"#).unwrap();
        assert_eq!(total.total, 150.25);

        let missing: TotalResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert_eq!(missing.total, 0.0);
    }
}
