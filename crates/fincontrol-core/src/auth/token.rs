//! Client-side access token checks.
//!
//! The JWT payload is decoded without verifying the signature. The only claim
//! consulted is `exp`; the server stays the authority on whether a token is
//! accepted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::CredentialStore;
use crate::storage::StorageError;

/// Seconds before `exp` at which a token is already treated as expired.
pub const EXPIRY_LEEWAY_SECS: i64 = 5;

/// Tokens that are not decodable JWTs must be longer than this to pass.
const MIN_OPAQUE_TOKEN_LEN: usize = 10;

fn is_base64url_segment(segment: &str) -> bool {
    segment
        .trim_end_matches('=')
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Check the JWT shape: three dot-separated base64url segments with a
/// non-empty header and payload. The signature segment may be empty.
pub fn looks_like_jwt(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 3
        && !parts[0].is_empty()
        && !parts[1].is_empty()
        && parts.iter().all(|p| is_base64url_segment(p))
}

/// Decode the payload segment of a three-part token as JSON.
/// Returns `None` for anything that is not a decodable JWT.
pub fn decode_claims(token: &str) -> Option<Value> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// The numeric `exp` claim in seconds since the epoch, if the token has one.
pub fn expiry_claim(token: &str) -> Option<f64> {
    decode_claims(token)?.get("exp")?.as_f64()
}

/// Validity rule for a raw access token at `now` (seconds since the epoch).
///
/// With an `exp` claim the token is valid while `exp > now + leeway`.
/// Tokens without one (opaque tokens, or JWTs whose payload does not decode)
/// pass when they are longer than a minimal length.
pub fn is_token_valid(token: &str, now: i64, leeway_secs: i64) -> bool {
    if token.is_empty() {
        return false;
    }
    match expiry_claim(token) {
        Some(exp) => exp > (now + leeway_secs) as f64,
        None => token.len() > MIN_OPAQUE_TOKEN_LEN,
    }
}

/// Answers "is the stored access token still usable?".
#[derive(Clone)]
pub struct TokenValidator {
    store: CredentialStore,
    leeway_secs: i64,
}

impl TokenValidator {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            leeway_secs: EXPIRY_LEEWAY_SECS,
        }
    }

    pub fn with_leeway(mut self, leeway_secs: i64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    pub fn is_valid(&self) -> Result<bool, StorageError> {
        self.is_valid_at(Utc::now().timestamp())
    }

    pub fn is_valid_at(&self, now: i64) -> Result<bool, StorageError> {
        Ok(self
            .store
            .access_token()?
            .map(|token| is_token_valid(&token, now, self.leeway_secs))
            .unwrap_or(false))
    }

    /// Expiry of the stored access token, when it carries an `exp` claim.
    pub fn expires_at(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self
            .store
            .access_token()?
            .and_then(|token| expiry_claim(&token))
            .and_then(|exp| DateTime::from_timestamp(exp as i64, 0)))
    }
}

// ============================================================================
// Tests
// ============================================================================
