//! Core library for the FinanControl client.
//!
//! - `storage`: secure key-value backends (OS keyring, file, memory)
//! - `auth`: persisted credentials, token expiry checks, session state
//! - `api`: authenticated HTTP gateway with single-flight token refresh,
//!   plus typed auth and finance endpoints
//! - `models`: API payload types
//! - `config`: on-disk configuration with environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError, ApiRequest, RefreshError};
pub use auth::{CredentialStore, SessionEvent, SessionState, TokenValidator};
pub use config::Config;
