//! Authentication module for persisted credentials and session state.
//!
//! This module provides:
//! - `CredentialStore`: access token, refresh token and user profile storage
//!   with fail-closed corruption handling
//! - `TokenValidator`: client-side JWT expiry check with a small leeway
//! - `SessionState` / `SessionEvent`: startup routing and lifecycle signals

pub mod credentials;
pub mod session;
pub mod token;

pub use credentials::{CredentialRecord, CredentialStore};
pub use session::{Route, SessionEvent, SessionState};
pub use token::{is_token_valid, TokenValidator, EXPIRY_LEEWAY_SECS};
