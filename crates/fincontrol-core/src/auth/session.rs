use chrono::Utc;

use super::{CredentialStore, TokenValidator};
use crate::models::UserProfile;
use crate::storage::StorageError;

/// Where the application should send the user on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login { session_expired: bool },
}

/// What the persisted credentials say about the user.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Valid access token and a usable profile
    Authenticated(UserProfile),
    /// A token is stored but it is expired or the profile is missing
    Expired,
    /// Nothing stored
    Anonymous,
}

impl SessionState {
    /// Resolve the current state from storage.
    pub fn resolve(store: &CredentialStore) -> Result<Self, StorageError> {
        Self::resolve_at(store, Utc::now().timestamp())
    }

    pub fn resolve_at(store: &CredentialStore, now: i64) -> Result<Self, StorageError> {
        let record = store.load()?;
        if record.access_token.is_none() {
            return Ok(SessionState::Anonymous);
        }
        if !TokenValidator::new(store.clone()).is_valid_at(now)? {
            return Ok(SessionState::Expired);
        }
        match record.user_profile.as_ref().and_then(UserProfile::from_value) {
            Some(profile) => Ok(SessionState::Authenticated(profile)),
            None => Ok(SessionState::Expired),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn entry_route(&self) -> Route {
        match self {
            SessionState::Authenticated(_) => Route::Home,
            SessionState::Expired => Route::Login {
                session_expired: true,
            },
            SessionState::Anonymous => Route::Login {
                session_expired: false,
            },
        }
    }
}

/// Session lifecycle notifications broadcast by the API client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    /// Explicit logout by the user
    LoggedOut,
    /// Refresh failed and credentials were purged; the user must log in again
    Expired { reason: String },
}

impl SessionEvent {
    /// Whether the application should navigate to the login screen
    pub fn requires_login(&self) -> bool {
        matches!(self, SessionEvent::LoggedOut | SessionEvent::Expired { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::auth::token::tests::make_jwt;
    use crate::storage::MemoryStorage;

    const NOW: i64 = 1_700_000_000;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_anonymous() {
        let state = SessionState::resolve_at(&store(), NOW).unwrap();
        assert_eq!(state, SessionState::Anonymous);
        assert_eq!(
            state.entry_route(),
            Route::Login {
                session_expired: false
            }
        );
    }

    #[test]
    fn test_authenticated() {
        let store = store();
        let token = make_jwt(&json!({"exp": NOW + 3600}));
        store
            .save(&token, Some("r1"), Some(&json!({"id": "u1", "username": "ana"})))
            .unwrap();

        let state = SessionState::resolve_at(&store, NOW).unwrap();
        assert!(state.is_authenticated());
        assert_eq!(state.profile().unwrap().username.as_deref(), Some("ana"));
        assert_eq!(state.entry_route(), Route::Home);
    }

    #[test]
    fn test_expired_token() {
        let store = store();
        let token = make_jwt(&json!({"exp": NOW - 1}));
        store.save(&token, None, Some(&json!({"id": "u1"}))).unwrap();

        let state = SessionState::resolve_at(&store, NOW).unwrap();
        assert_eq!(state, SessionState::Expired);
        assert_eq!(
            state.entry_route(),
            Route::Login {
                session_expired: true
            }
        );
    }

    #[test]
    fn test_valid_token_without_profile() {
        let store = store();
        store
            .save(&make_jwt(&json!({"exp": NOW + 3600})), None, None)
            .unwrap();
        assert_eq!(
            SessionState::resolve_at(&store, NOW).unwrap(),
            SessionState::Expired
        );
    }

    #[test]
    fn test_event_requires_login() {
        assert!(SessionEvent::LoggedOut.requires_login());
        assert!(SessionEvent::Expired {
            reason: "x".into()
        }
        .requires_login());
        assert!(!SessionEvent::Refreshed.requires_login());
        assert!(!SessionEvent::LoggedIn.requires_login());
    }
}
