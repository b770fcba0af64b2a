//! API client for the plant storefront REST API.
//!
//! `ApiClient` attaches the session's bearer token to every request and
//! recovers from an expired token by refreshing once and replaying the
//! original request once.

use std::sync::Arc;

use anyhow::Result;
use reqwest::{header, Method, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Session;

use super::ApiError;

/// A request as issued by the caller; replayed unchanged on retry.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }
}

/// Per-call flag: has this logical request already been through a
/// refresh-and-retry cycle. Never shared between calls.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct RetryMarker {
    retried: bool,
}

impl RetryMarker {
    /// Mark the call as retried. Returns false if it already was.
    fn mark(&mut self) -> bool {
        !std::mem::replace(&mut self.retried, true)
    }
}

/// API client for the storefront.
/// Clone is cheap - the session (and its connection pool) is shared.
#[derive(Clone)]
pub struct ApiClient {
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Send an authenticated request and return the successful response.
    ///
    /// A 401 triggers at most one refresh and one replay; the replay's
    /// outcome is returned as-is. Every other failure propagates untouched.
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response> {
        let descriptor = RequestDescriptor::new(method, path, body);
        self.execute(&descriptor, RetryMarker::default()).await
    }

    pub(crate) async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        mut marker: RetryMarker,
    ) -> Result<Response> {
        let token = self.session.token();
        let response = self.dispatch(descriptor, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_response(response).await;
        }

        let original = Self::into_error(response).await;
        if !marker.mark() {
            debug!(path = %descriptor.path, "Unauthorized after retry, giving up");
            return Err(original.into());
        }

        match self.session.refresh_after(token.as_deref()).await {
            Some(fresh) => {
                debug!(method = %descriptor.method, path = %descriptor.path, "Replaying request with refreshed token");
                let retry = self.dispatch(descriptor, Some(&fresh)).await?;
                Self::check_response(retry).await
            }
            None => {
                warn!(path = %descriptor.path, "Token refresh failed, request stays unauthorized");
                Err(original.into())
            }
        }
    }

    async fn dispatch(&self, descriptor: &RequestDescriptor, token: Option<&str>) -> Result<Response> {
        let url = self.session.resolve(&descriptor.path)?;

        let mut request = self
            .session
            .http()
            .request(descriptor.method.clone(), url)
            .headers(Self::auth_headers(token)?);
        if let Some(ref body) = descriptor.body {
            request = request.json(body);
        }

        debug!(method = %descriptor.method, path = %descriptor.path, "Sending request");
        let response = request.send().await.map_err(ApiError::Network)?;
        Ok(response)
    }

    fn auth_headers(token: Option<&str>) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidResponse("Stored token is not a valid header value".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::into_error(response).await.into())
        }
    }

    async fn into_error(response: Response) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ApiError::from_status(status, &body)
    }
}
