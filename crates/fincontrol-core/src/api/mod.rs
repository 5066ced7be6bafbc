//! REST API client for the FinanControl backend.
//!
//! `ApiClient` attaches the stored bearer token to every protected request
//! and transparently refreshes it on 401/403. Concurrent failures share one
//! refresh; if it fails the session is ended for everyone waiting on it.

pub mod auth;
pub mod client;
pub mod error;
pub mod finance;

pub use auth::{LoginOutcome, LoginRequest, NewUser, RegisterOutcome};
pub use client::{is_public_path, ApiClient, ApiRequest};
pub use error::{ApiError, RefreshError};
