use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User identifier. The API has used both string and numeric ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Text(String),
    Number(i64),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Text(id) => f.write_str(id),
            UserId::Number(id) => write!(f, "{}", id),
        }
    }
}

/// Typed view of the stored user profile blob.
///
/// Unknown fields are kept in `extra` so the blob round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// Interpret an opaque profile value. Returns `None` if it has no usable id.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Name to greet the user with
    pub fn display_name(&self) -> String {
        self.nome
            .as_deref()
            .or(self.username.as_deref())
            .or(self.email.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("user {}", self.id))
    }
}

/// Body of `PUT /usuarios/{id}`
#[derive(Debug, Clone, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_profile_from_value() {
        let profile = UserProfile::from_value(&json!({
            "id": "abc",
            "username": "ana",
            "email": "ana@example.com",
            "telefone": "11999999999"
        }))
        .unwrap();
        assert_eq!(profile.id, UserId::Text("abc".to_string()));
        assert_eq!(profile.username.as_deref(), Some("ana"));
        assert_eq!(profile.extra.get("telefone"), Some(&json!("11999999999")));
    }

    #[test]
    fn test_numeric_id() {
        let profile = UserProfile::from_value(&json!({"id": 12})).unwrap();
        assert_eq!(profile.id.to_string(), "12");
    }

    #[test]
    fn test_profile_without_id() {
        assert!(UserProfile::from_value(&json!({"username": "ana"})).is_none());
        assert!(UserProfile::from_value(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_profile_round_trips_unknown_fields() {
        let value = json!({"id": "1", "nome": "Ana", "plano": {"tipo": "free"}});
        let profile = UserProfile::from_value(&value).unwrap();
        assert_eq!(serde_json::to_value(&profile).unwrap(), value);
    }

    #[test]
    fn test_display_name() {
        let named = UserProfile::from_value(&json!({"id": "1", "nome": "Ana", "username": "ana"})).unwrap();
        assert_eq!(named.display_name(), "Ana");
        let bare = UserProfile::from_value(&json!({"id": 3})).unwrap();
        assert_eq!(bare.display_name(), "user 3");
    }

    #[test]
    fn test_profile_update_skips_empty_fields() {
        let update = ProfileUpdate {
            email: Some("new@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"email": "new@example.com"})
        );
    }
}
