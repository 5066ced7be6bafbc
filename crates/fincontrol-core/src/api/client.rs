//! API client for the FinanControl REST API.
//!
//! Every protected request carries the stored access token as a bearer
//! credential. When one comes back 401 (or 403 when configured) the client
//! runs a single token refresh that every concurrently failing request waits
//! on, then replays each of them with the new token. A failed refresh purges
//! the stored credentials and broadcasts `SessionEvent::Expired`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};

use super::{ApiError, RefreshError};
use crate::auth::token::looks_like_jwt;
use crate::auth::{CredentialStore, SessionEvent};
use crate::config::ApiConfig;
use crate::models::Envelope;

// ============================================================================
// Constants
// ============================================================================

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
pub const REFRESH_PATH: &str = "/token/refresh";

/// Endpoints sent without a bearer token and exempt from the refresh protocol
const PUBLIC_PATHS: [&str; 4] = [LOGIN_PATH, REGISTER_PATH, FORGOT_PASSWORD_PATH, REFRESH_PATH];

/// Buffer size for the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

pub fn is_public_path(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    let path = path.trim_end_matches('/');
    PUBLIC_PATHS.contains(&path)
}

// ============================================================================
// Requests
// ============================================================================

/// A replayable description of one API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_public(&self) -> bool {
        is_public_path(&self.path)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<Value>,
}

// ============================================================================
// Client
// ============================================================================

type RefreshWaiter = oneshot::Sender<Result<String, RefreshError>>;

/// Single-flight refresh guard. Only touched inside short critical sections.
#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<RefreshWaiter>,
}

struct Inner {
    http: Client,
    base_url: String,
    store: CredentialStore,
    refresh_timeout: Duration,
    refresh_on_forbidden: bool,
    refresh: Mutex<RefreshState>,
    events: broadcast::Sender<SessionEvent>,
}

/// API client for FinanControl.
/// Clone is cheap - clones share the connection pool, the credential store and
/// the refresh state, so construct one per process and hand out clones.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: &ApiConfig, store: CredentialStore) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                store,
                refresh_timeout: config.refresh_timeout(),
                refresh_on_forbidden: config.refresh_on_forbidden,
                refresh: Mutex::new(RefreshState::default()),
                events,
            }),
        })
    }

    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Receive session lifecycle events (login, refresh, logout, expiry)
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        debug!(?event, "Session event");
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    fn is_auth_failure(&self, status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED
            || (self.inner.refresh_on_forbidden && status == StatusCode::FORBIDDEN)
    }

    fn refresh_state(&self) -> MutexGuard<'_, RefreshState> {
        self.inner
            .refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), self.url(&request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    /// Send a request to a public endpoint and return the raw response,
    /// whatever its status. No token is attached and no refresh happens.
    pub(crate) async fn send_public(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        self.dispatch(request, None).await
    }

    /// Send a request through the authentication gateway.
    ///
    /// Returns the response for any 2xx status. Auth failures on protected
    /// endpoints go through one refresh-and-replay; every other error status
    /// is returned unchanged.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        if request.is_public() {
            return check_response(self.send_public(request).await?).await;
        }

        let sent_with = self.inner.store.access_token()?;
        let response = self.dispatch(request, sent_with.as_deref()).await?;
        if !self.is_auth_failure(response.status()) {
            return check_response(response).await;
        }
        debug!(
            method = %request.method,
            path = %request.path,
            status = %response.status(),
            "Authentication failure on protected request"
        );

        let token = match self.inner.store.access_token()? {
            Some(current) if sent_with.as_ref() != Some(&current) => {
                debug!(path = %request.path, "Token changed while request was in flight, replaying");
                current
            }
            // Credentials were purged while this request was in flight; that
            // cycle already signalled the logout
            None if sent_with.is_some() => {
                debug!(path = %request.path, "Session ended while request was in flight");
                return Err(RefreshError::SessionEnded.into());
            }
            _ => self.refreshed_token().await?,
        };

        // Replayed once; a second auth failure is returned to the caller
        let response = self.dispatch(request, Some(&token)).await?;
        check_response(response).await
    }

    /// Wait for a fresh access token, starting the refresh if none is running.
    async fn refreshed_token(&self) -> Result<String, RefreshError> {
        let (tx, rx) = oneshot::channel();
        let start_refresh = {
            let mut state = self.refresh_state();
            state.waiters.push_back(tx);
            !std::mem::replace(&mut state.in_flight, true)
        };

        if start_refresh {
            debug!("Starting token refresh");
            let client = self.clone();
            tokio::spawn(async move { client.run_refresh().await });
        } else {
            debug!("Token refresh in flight, request queued");
        }

        rx.await.unwrap_or(Err(RefreshError::Abandoned))
    }

    async fn run_refresh(&self) {
        let timeout = self.inner.refresh_timeout;
        let outcome = match tokio::time::timeout(timeout, self.request_new_tokens()).await {
            Ok(result) => result,
            Err(_) => Err(RefreshError::TimedOut(timeout)),
        };

        match &outcome {
            Ok(_) => self.emit(SessionEvent::Refreshed),
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                if let Err(e) = self.inner.store.clear() {
                    error!(error = %e, "Failed to purge credentials after refresh failure");
                }
                self.emit(SessionEvent::Expired {
                    reason: e.to_string(),
                });
            }
        }

        let waiters = {
            let mut state = self.refresh_state();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        info!(
            released = waiters.len(),
            success = outcome.is_ok(),
            "Token refresh finished"
        );
        for waiter in waiters {
            // A closed receiver means that caller gave up waiting
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn request_new_tokens(&self) -> Result<String, RefreshError> {
        let store = &self.inner.store;
        let refresh_token = store
            .refresh_token()
            .map_err(|e| RefreshError::Storage(e.to_string()))?
            .ok_or(RefreshError::MissingRefreshToken)?;

        let response = self
            .inner
            .http
            .post(self.url(REFRESH_PATH))
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Rejected(status.as_u16()));
        }

        let tokens = response
            .json::<Envelope<TokenResponse>>()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?
            .into_data();
        if !looks_like_jwt(&tokens.token) {
            return Err(RefreshError::InvalidResponse(
                "access token is not a JWT".to_string(),
            ));
        }

        store
            .save(
                &tokens.token,
                tokens.refresh_token.as_deref(),
                tokens.user.as_ref(),
            )
            .map_err(|e| RefreshError::Storage(e.to_string()))?;
        Ok(tokens.token)
    }

    // ===== Typed helpers =====

    /// Send a request and decode the JSON body
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.send(&request).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(path = %request.path, error = %e, "Failed to parse response");
            ApiError::InvalidResponse(format!("{}: {}", request.path, e))
        })
    }

    /// Send a request and decode the payload of a `{ success, data }` envelope
    pub async fn fetch_data<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        Ok(self.fetch::<Envelope<T>>(request).await?.into_data())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch(ApiRequest::get(path)).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.fetch(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.fetch(ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(&ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// End the session: purge stored credentials and notify subscribers
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.inner.store.clear()?;
        info!("Logged out");
        self.emit(SessionEvent::LoggedOut);
        Ok(())
    }
}

/// Check if response is successful, returning an error with body if not.
pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc as StdArc;

    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/auth/login"));
        assert!(is_public_path("/auth/login/"));
        assert!(is_public_path("/auth/register?source=app"));
        assert!(is_public_path("/token/refresh"));
        assert!(!is_public_path("/auth/me"));
        assert!(!is_public_path("/contas/user/1"));
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::get("despesas/total-mes/1")
            .query("ano", 2025)
            .query("mes", 2);
        assert_eq!(request.path(), "/despesas/total-mes/1");
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.query.len(), 2);
        assert!(!request.is_public());

        let login = ApiRequest::post(LOGIN_PATH)
            .json(&serde_json::json!({"username": "a", "senha": "b"}))
            .unwrap();
        assert!(login.is_public());
        assert!(login.body.is_some());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let store = CredentialStore::new(StdArc::new(MemoryStorage::new()));
        let client = ApiClient::new(&ApiConfig::with_base_url("http://localhost:3000/api/"), store)
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/api");
        assert_eq!(client.url("/contas"), "http://localhost:3000/api/contas");
    }

    #[tokio::test]
    async fn test_waiters_released_in_queue_order() {
        // No refresh token stored, so the cycle fails without any HTTP call
        let store = CredentialStore::new(StdArc::new(MemoryStorage::new()));
        let client = ApiClient::new(&ApiConfig::with_base_url("http://127.0.0.1:9"), store)
            .unwrap();
        let released = StdArc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        {
            let mut state = client.refresh_state();
            state.in_flight = true;
            for position in 0..4 {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                let released = released.clone();
                handles.push(tokio::spawn(async move {
                    let outcome = rx.await.unwrap();
                    released.lock().unwrap().push((position, outcome));
                }));
            }
        }
        tokio::task::yield_now().await;

        client.run_refresh().await;
        for handle in handles {
            handle.await.unwrap();
        }

        let released = released.lock().unwrap();
        let order: Vec<usize> = released.iter().map(|(position, _)| *position).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert!(released
            .iter()
            .all(|(_, outcome)| *outcome == Err(RefreshError::MissingRefreshToken)));

        let state = client.refresh_state();
        assert!(!state.in_flight);
        assert!(state.waiters.is_empty());
    }
}
