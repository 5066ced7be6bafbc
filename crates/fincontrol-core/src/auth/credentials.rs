use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::token::looks_like_jwt;
use crate::storage::{SecureStorage, StorageError};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "userToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage key for the JSON-serialized user profile
pub const USER_PROFILE_KEY: &str = "user";

/// Everything persisted for a signed-in user. Absent fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_profile: Option<Value>,
}

impl CredentialRecord {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user_profile.is_none()
    }
}

/// Parse a stored profile. Only JSON objects or arrays are accepted, which
/// also rejects values like `[object Object]`.
fn parse_profile(raw: &str) -> Option<Value> {
    if !(raw.starts_with('{') || raw.starts_with('[')) {
        return None;
    }
    serde_json::from_str(raw).ok()
}

/// Outcome of reading one checked field from storage.
enum Field<T> {
    Absent,
    Valid(T),
    Malformed,
}

impl<T> Field<T> {
    fn into_option(self) -> Option<T> {
        match self {
            Field::Valid(value) => Some(value),
            Field::Absent | Field::Malformed => None,
        }
    }
}

/// Reads and writes the credential record through a [`SecureStorage`] backend.
///
/// Malformed data fails closed: if the stored access token or profile does not
/// have the expected shape, all three keys are deleted and nothing is returned.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn SecureStorage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Persist the provided fields. Omitted fields keep their stored value.
    ///
    /// The access token must be JWT-shaped. Anything else would read back as
    /// corruption and purge the whole record, so it is rejected with
    /// [`StorageError::Malformed`] and nothing is written.
    pub fn save(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        user_profile: Option<&Value>,
    ) -> Result<(), StorageError> {
        if !looks_like_jwt(access_token) {
            warn!("Refusing to save an access token that is not JWT-shaped");
            return Err(StorageError::Malformed(
                "access token is not a JWT".to_string(),
            ));
        }
        self.storage.set(ACCESS_TOKEN_KEY, access_token)?;
        if let Some(refresh_token) = refresh_token {
            self.storage.set(REFRESH_TOKEN_KEY, refresh_token)?;
        }
        if let Some(profile) = user_profile {
            let json = serde_json::to_string(profile)?;
            self.storage.set(USER_PROFILE_KEY, &json)?;
        }
        Ok(())
    }

    /// Read back every field, purging the record if any part is malformed.
    pub fn load(&self) -> Result<CredentialRecord, StorageError> {
        let access_token = self.read_access_token()?;
        let user_profile = self.read_user_profile()?;

        match (access_token, user_profile) {
            (Field::Malformed, _) | (_, Field::Malformed) => {
                warn!("Stored credentials are malformed, purging");
                self.clear()?;
                Ok(CredentialRecord::default())
            }
            (access_token, user_profile) => Ok(CredentialRecord {
                access_token: access_token.into_option(),
                refresh_token: self.refresh_token()?,
                user_profile: user_profile.into_option(),
            }),
        }
    }

    pub fn access_token(&self) -> Result<Option<String>, StorageError> {
        let field = self.read_access_token()?;
        self.purge_if_malformed(field)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .storage
            .get(REFRESH_TOKEN_KEY)?
            .filter(|token| !token.is_empty()))
    }

    pub fn user_profile(&self) -> Result<Option<Value>, StorageError> {
        let field = self.read_user_profile()?;
        self.purge_if_malformed(field)
    }

    fn read_access_token(&self) -> Result<Field<String>, StorageError> {
        Ok(match self.storage.get(ACCESS_TOKEN_KEY)? {
            Some(token) if looks_like_jwt(&token) => Field::Valid(token),
            Some(_) => Field::Malformed,
            None => Field::Absent,
        })
    }

    fn read_user_profile(&self) -> Result<Field<Value>, StorageError> {
        Ok(match self.storage.get(USER_PROFILE_KEY)? {
            Some(raw) => parse_profile(&raw).map_or(Field::Malformed, Field::Valid),
            None => Field::Absent,
        })
    }

    fn purge_if_malformed<T>(&self, field: Field<T>) -> Result<Option<T>, StorageError> {
        if let Field::Malformed = field {
            warn!("Stored credentials are malformed, purging");
            self.clear()?;
        }
        Ok(field.into_option())
    }

    /// Delete all three keys unconditionally.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.delete(ACCESS_TOKEN_KEY)?;
        self.storage.delete(REFRESH_TOKEN_KEY)?;
        self.storage.delete(USER_PROFILE_KEY)?;
        Ok(())
    }

    /// Check if an access token is stored (without validating its expiry)
    pub fn has_credentials(&self) -> Result<bool, StorageError> {
        Ok(self.access_token()?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::auth::token::tests::make_jwt;
    use crate::storage::MemoryStorage;

    fn store() -> (Arc<MemoryStorage>, CredentialStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = CredentialStore::new(storage.clone());
        (storage, store)
    }

    #[test]
    fn test_round_trip() {
        let (_, store) = store();
        let token = make_jwt(&json!({"sub": "1", "exp": 2_000_000_000}));
        let profile = json!({"id": "1", "username": "ana", "email": "ana@example.com"});

        store.save(&token, Some("refresh-1"), Some(&profile)).unwrap();

        let record = store.load().unwrap();
        assert_eq!(
            record,
            CredentialRecord {
                access_token: Some(token),
                refresh_token: Some("refresh-1".to_string()),
                user_profile: Some(profile),
            }
        );
    }

    #[test]
    fn test_save_leaves_omitted_fields_unchanged() {
        let (_, store) = store();
        let first = make_jwt(&json!({"n": 1}));
        let second = make_jwt(&json!({"n": 2}));
        let profile = json!({"id": 7});

        store.save(&first, Some("r1"), Some(&profile)).unwrap();
        store.save(&second, None, None).unwrap();

        let record = store.load().unwrap();
        assert_eq!(record.access_token, Some(second));
        assert_eq!(record.refresh_token.as_deref(), Some("r1"));
        assert_eq!(record.user_profile, Some(profile));
    }

    #[test]
    fn test_load_empty() {
        let (_, store) = store();
        let record = store.load().unwrap();
        assert!(record.is_empty());
        assert!(!store.has_credentials().unwrap());
    }

    #[test]
    fn test_corrupt_profile_is_purged() {
        let (storage, store) = store();
        let token = make_jwt(&json!({"sub": "1"}));
        store.save(&token, Some("r1"), None).unwrap();
        storage.set(USER_PROFILE_KEY, "[object Object]").unwrap();

        let record = store.load().unwrap();
        assert_eq!(record.user_profile, None);
        assert_eq!(storage.get(USER_PROFILE_KEY).unwrap(), None);
        // Fail closed: the rest of the record goes with it
        assert!(record.is_empty());
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_unparseable_profile_is_purged() {
        let (storage, store) = store();
        storage.set(USER_PROFILE_KEY, "{\"id\": ").unwrap();
        assert_eq!(store.user_profile().unwrap(), None);
        assert_eq!(storage.get(USER_PROFILE_KEY).unwrap(), None);
    }

    #[test]
    fn test_malformed_access_token_is_purged() {
        let (storage, store) = store();
        storage.set(ACCESS_TOKEN_KEY, "not a jwt").unwrap();
        storage.set(REFRESH_TOKEN_KEY, "r1").unwrap();
        storage.set(USER_PROFILE_KEY, "{\"id\":\"1\"}").unwrap();

        let record = store.load().unwrap();
        assert!(record.is_empty());
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get(USER_PROFILE_KEY).unwrap(), None);
    }

    #[test]
    fn test_array_profile_is_accepted() {
        let (storage, store) = store();
        storage.set(USER_PROFILE_KEY, "[1,2]").unwrap();
        assert_eq!(store.user_profile().unwrap(), Some(json!([1, 2])));
    }

    #[test]
    fn test_clear() {
        let (storage, store) = store();
        let token = make_jwt(&json!({"sub": "1"}));
        store
            .save(&token, Some("r1"), Some(&json!({"id": "1"})))
            .unwrap();
        store.clear().unwrap();

        assert!(store.load().unwrap().is_empty());
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap(), None);
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_save_rejects_non_jwt_token() {
        let (storage, store) = store();
        let token = make_jwt(&json!({"sub": "1"}));
        store
            .save(&token, Some("r1"), Some(&json!({"id": "1"})))
            .unwrap();

        let result = store.save("opaque-token-value", Some("r2"), None);
        assert!(matches!(result, Err(StorageError::Malformed(_))));

        // Nothing was overwritten and the record still loads
        let record = store.load().unwrap();
        assert_eq!(record.access_token, Some(token));
        assert_eq!(record.refresh_token.as_deref(), Some("r1"));
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
    }

    #[test]
    fn test_empty_refresh_token_reads_as_absent() {
        let (storage, store) = store();
        storage.set(REFRESH_TOKEN_KEY, "").unwrap();
        assert_eq!(store.refresh_token().unwrap(), None);
    }
}
