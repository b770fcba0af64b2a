use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use crate::api::ApiError;
use crate::config::{normalize_base_url, Config};

const LOGIN_PATH: &str = "auth/login";
const REGISTER_PATH: &str = "auth/register";
const REFRESH_PATH: &str = "auth/refreshToken";

/// Unauthenticated entry point callers should route to after logout.
pub const SIGN_IN_ROUTE: &str = "/user";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated,
}

/// Result of a logout: where the caller should navigate next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedOut {
    pub redirect_to: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
}

/// One authenticated session against the storefront server.
///
/// Owns the HTTP client, the base address and the credential store, and is
/// the only writer of that store. Construct once per application context
/// and share it through an `Arc`.
pub struct Session {
    http: Client,
    base_url: Url,
    store: Arc<dyn CredentialStore>,
    // Held while a refresh is in flight so concurrent 401s share one refresh.
    refresh_gate: Mutex<()>,
}

impl Session {
    /// The base address is normalized to end in `/` so relative paths join under it.
    pub fn new(base_url: Url, timeout: Duration, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.as_str())?;
        let http = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            store,
            refresh_gate: Mutex::new(()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.base_url()?,
            config.request_timeout(),
            config.credential_store(),
        )
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a relative path against the base address.
    ///
    /// The result must stay on the base origin and under the base path.
    pub fn resolve(&self, path: &str) -> Result<Url, ApiError> {
        let relative = path.trim_start_matches('/');
        let url = self
            .base_url
            .join(relative)
            .map_err(|e| ApiError::InvalidPath(format!("{}: {}", path, e)))?;

        if url.origin() != self.base_url.origin() || !url.path().starts_with(self.base_url.path()) {
            return Err(ApiError::InvalidPath(path.to_string()));
        }
        Ok(url)
    }

    /// Current access token, if any
    pub fn token(&self) -> Option<String> {
        self.store.get()
    }

    /// Optimistic check: a token is present. Freshness is not verified.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn state(&self) -> AuthState {
        if self.is_authenticated() {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        }
    }

    /// Log in and persist the returned access token.
    ///
    /// Resolves with the full server payload. Fails with
    /// [`ApiError::Authentication`] when the call fails or the payload has
    /// no `accessToken`; the stored token is left untouched in that case.
    pub async fn login(&self, email: &str, password: &str) -> Result<Value> {
        self.authenticate(LOGIN_PATH, email, password).await
    }

    /// Register a new account; same contract as [`Session::login`].
    pub async fn register(&self, email: &str, password: &str) -> Result<Value> {
        self.authenticate(REGISTER_PATH, email, password).await
    }

    async fn authenticate(&self, endpoint: &str, email: &str, password: &str) -> Result<Value> {
        let url = self.resolve(endpoint)?;
        let body = serde_json::json!({ "email": email, "password": password });

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Authentication(format!("Failed to reach server: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Authentication(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            warn!(endpoint, %status, "Authentication rejected");
            let message = ApiError::server_message(&text)
                .unwrap_or_else(|| ApiError::from_status(status, &text).to_string());
            return Err(ApiError::Authentication(message).into());
        }

        let payload: Value = serde_json::from_str(&text)
            .map_err(|_| ApiError::Authentication("Invalid response from server".to_string()))?;

        let token = payload
            .get("accessToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Authentication("No accessToken in response".to_string()))?;

        self.store
            .set(token)
            .context("Failed to persist access token")?;

        info!(endpoint, "Authenticated");
        Ok(payload)
    }

    /// Ask the server for a new access token.
    ///
    /// Sends the current token (if any) plus session cookies. Never fails:
    /// every problem is logged and reported as `None`. Does not persist.
    pub async fn refresh(&self) -> Option<String> {
        let url = match self.resolve(REFRESH_PATH) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Cannot build refresh URL");
                return None;
            }
        };

        let mut request = self.http.post(url);
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "Token refresh rejected");
            return None;
        }

        match response.json::<TokenResponse>().await {
            Ok(body) => body.access_token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to parse refresh response");
                None
            }
        }
    }

    /// Refresh once on behalf of a request that was rejected with `stale`.
    ///
    /// Concurrent callers are serialized; a caller that finds the stored
    /// token already replaced reuses it instead of refreshing again. A new
    /// token is persisted exactly once; on failure the store is untouched.
    pub(crate) async fn refresh_after(&self, stale: Option<&str>) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;

        if let Some(current) = self.token() {
            if stale != Some(current.as_str()) {
                debug!("Token already replaced by a concurrent refresh");
                return Some(current);
            }
        }

        let fresh = self.refresh().await?;
        if let Err(e) = self.store.set(&fresh) {
            warn!(error = %e, "Failed to persist refreshed token");
        }
        info!("Access token refreshed");
        Some(fresh)
    }

    /// Drop the stored token. Local only; safe to call repeatedly.
    pub fn logout(&self) -> Result<SignedOut> {
        self.store
            .remove()
            .context("Failed to remove stored token")?;
        info!("Signed out");
        Ok(SignedOut {
            redirect_to: SIGN_IN_ROUTE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryCredentialStore, NoopCredentialStore};

    fn session_with(store: Arc<dyn CredentialStore>) -> Session {
        let base = Url::parse("http://localhost:3001/api/").expect("base url");
        Session::new(base, Duration::from_secs(5), store).expect("session")
    }

    #[test]
    fn test_resolve_stays_under_base() {
        let session = session_with(Arc::new(NoopCredentialStore));

        assert_eq!(
            session.resolve("plants").expect("relative").as_str(),
            "http://localhost:3001/api/plants"
        );
        assert_eq!(
            session.resolve("/plants/7").expect("leading slash").as_str(),
            "http://localhost:3001/api/plants/7"
        );
        assert_eq!(
            session.resolve("//evil.example/plants").expect("host-relative").as_str(),
            "http://localhost:3001/api/evil.example/plants"
        );

        assert!(matches!(
            session.resolve("http://evil.example/api/plants"),
            Err(ApiError::InvalidPath(_))
        ));
        assert!(matches!(
            session.resolve("../admin"),
            Err(ApiError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_base_without_trailing_slash_keeps_its_path() {
        let base = Url::parse("http://localhost:3001/api?debug=1").expect("base url");
        let session =
            Session::new(base, Duration::from_secs(5), Arc::new(NoopCredentialStore)).expect("session");

        assert_eq!(session.base_url().as_str(), "http://localhost:3001/api/");
        assert_eq!(
            session.resolve("plants/7").expect("relative").as_str(),
            "http://localhost:3001/api/plants/7"
        );
    }

    #[test]
    fn test_state_follows_store() {
        let store = Arc::new(MemoryCredentialStore::new());
        let session = session_with(store.clone());
        assert_eq!(session.state(), AuthState::Anonymous);
        assert!(!session.is_authenticated());

        store.set("tok").expect("set");
        assert_eq!(session.state(), AuthState::Authenticated);
        assert_eq!(session.token().as_deref(), Some("tok"));
    }

    #[test]
    fn test_logout_is_idempotent() {
        let store = Arc::new(MemoryCredentialStore::with_token("tok"));
        let session = session_with(store.clone());

        let signed_out = session.logout().expect("logout");
        assert_eq!(signed_out.redirect_to, SIGN_IN_ROUTE);
        assert_eq!(store.get(), None);

        session.logout().expect("second logout");
        assert_eq!(session.state(), AuthState::Anonymous);
    }

    #[test]
    fn test_logout_without_backend() {
        let session = session_with(Arc::new(NoopCredentialStore));
        assert!(session.logout().is_ok());
        assert!(!session.is_authenticated());
    }
}
