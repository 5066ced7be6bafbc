//! Login, registration and password recovery.
//!
//! These endpoints are public: they are sent without a bearer token and an
//! auth failure from them is an answer for the user, not a reason to refresh.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::client::{ApiClient, ApiRequest, FORGOT_PASSWORD_PATH, LOGIN_PATH, REGISTER_PATH};
use super::ApiError;
use crate::auth::token::looks_like_jwt;
use crate::auth::{SessionEvent, SessionState};
use crate::models::{Envelope, UserProfile};

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub senha: String,
}

impl LoginRequest {
    pub fn new(username: &str, senha: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            senha: senha.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authenticated(UserProfile),
    /// Server answered 401: wrong username or password
    InvalidCredentials,
    /// Server refused with its own message
    Rejected { message: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<Value>,
    #[serde(default)]
    erro: Option<String>,
}

/// Body of `POST /auth/register`
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub nome: String,
    pub email: String,
    pub telefone: String,
    pub username: String,
    pub senha: String,
}

impl NewUser {
    /// Build a registration with the username taken from the e-mail's local part.
    pub fn new(nome: &str, email: &str, telefone: &str, senha: &str) -> Self {
        let email = email.trim();
        Self {
            nome: nome.trim().to_string(),
            email: email.to_string(),
            telefone: telefone.trim().to_string(),
            username: username_from_email(email),
            senha: senha.to_string(),
        }
    }

    pub fn with_username(mut self, username: &str) -> Self {
        let username = username.trim();
        if !username.is_empty() {
            self.username = username.to_string();
        }
        self
    }
}

pub fn username_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    Rejected { message: String },
}

impl ApiClient {
    /// Authenticate and persist the returned credentials.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome, ApiError> {
        let api_request = ApiRequest::post(LOGIN_PATH).json(request)?;
        let response = self.send_public(&api_request).await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            info!(username = %request.username, "Login rejected: invalid credentials");
            return Ok(LoginOutcome::InvalidCredentials);
        }

        let body = response.text().await?;
        if !status.is_success() {
            if status.is_client_error() {
                if let Some(message) = ApiError::server_message(&body) {
                    info!(status = %status, "Login refused by server");
                    return Ok(LoginOutcome::Rejected { message });
                }
            }
            return Err(ApiError::from_status(status, &body));
        }

        let parsed = serde_json::from_str::<Envelope<LoginResponse>>(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("login: {}", e)))?
            .into_data();

        match parsed {
            LoginResponse {
                token: Some(token),
                user: Some(user),
                refresh_token,
                ..
            } if looks_like_jwt(&token) => {
                let profile = UserProfile::from_value(&user).ok_or_else(|| {
                    ApiError::InvalidResponse("login response user has no id".to_string())
                })?;
                // Drop whatever an earlier account left behind
                self.store().clear()?;
                self.store()
                    .save(&token, refresh_token.as_deref(), Some(&user))?;
                info!(user = %profile.id, "Logged in");
                self.emit(SessionEvent::LoggedIn);
                Ok(LoginOutcome::Authenticated(profile))
            }
            LoginResponse {
                erro: Some(message),
                ..
            } => Ok(LoginOutcome::Rejected { message }),
            _ => {
                warn!("Login response missing a usable token or user");
                Err(ApiError::InvalidResponse(
                    "login response missing a usable token or user".to_string(),
                ))
            }
        }
    }

    pub async fn register(&self, user: &NewUser) -> Result<RegisterOutcome, ApiError> {
        let request = ApiRequest::post(REGISTER_PATH).json(user)?;
        let response = self.send_public(&request).await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            if let Some(message) = rejection_in_success(&body) {
                return Ok(RegisterOutcome::Rejected { message });
            }
            info!(username = %user.username, "Account registered");
            return Ok(RegisterOutcome::Registered);
        }
        if status.is_client_error() {
            if let Some(message) = ApiError::server_message(&body) {
                return Ok(RegisterOutcome::Rejected { message });
            }
        }
        Err(ApiError::from_status(status, &body))
    }

    /// Ask the server to e-mail password reset instructions
    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post(FORGOT_PASSWORD_PATH).json(&json!({ "email": email.trim() }))?;
        self.send(&request).await?;
        info!("Password reset requested");
        Ok(())
    }

    /// The stored user profile, if any
    pub fn current_user(&self) -> Result<Option<UserProfile>, ApiError> {
        Ok(self
            .store()
            .user_profile()?
            .as_ref()
            .and_then(UserProfile::from_value))
    }

    pub fn session_state(&self) -> Result<SessionState, ApiError> {
        Ok(SessionState::resolve(self.store())?)
    }
}

/// A 2xx body that still reports failure with `erro`
fn rejection_in_success(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value.get("erro")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_from_email() {
        assert_eq!(username_from_email("ana.souza@example.com"), "ana.souza");
        assert_eq!(username_from_email("plain"), "plain");
        assert_eq!(username_from_email(""), "");
    }

    #[test]
    fn test_new_user_trims_and_derives() {
        let user = NewUser::new(" Ana ", " ana@example.com ", "11 9999", "pw");
        assert_eq!(user.nome, "Ana");
        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.username, "ana");

        let user = user.with_username("  ");
        assert_eq!(user.username, "ana");
        let user = user.with_username("ana_s");
        assert_eq!(user.username, "ana_s");
    }

    #[test]
    fn test_login_request_body() {
        let body = serde_json::to_value(LoginRequest::new(" ana ", "secret")).unwrap();
        assert_eq!(body, json!({"username": "ana", "senha": "secret"}));
    }

    #[test]
    fn test_rejection_in_success() {
        assert_eq!(
            rejection_in_success(r#"{"erro": "E-mail já cadastrado"}"#).as_deref(),
            Some("E-mail já cadastrado")
        );
        assert_eq!(rejection_in_success(r#"{"success": true}"#), None);
        assert_eq!(rejection_in_success(""), None);
    }
}
