use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Unauthorized - token may be expired: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request path: {0}")]
    InvalidPath(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
    }

    /// Classify a non-success status. A JSON `message` field in the body
    /// replaces the raw body as the error detail.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = match Self::server_message(body) {
            Some(message) => Self::truncate_body(&message),
            None => Self::truncate_body(body),
        };
        match status.as_u16() {
            401 => ApiError::Unauthorized(truncated),
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// True for the 401 case that the request pipeline recovers from.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// Best-effort extraction of a server-supplied `message` field.
    pub fn server_message(body: &str) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()?
            .get("message")?
            .as_str()
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_maps_codes() {
        assert!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, "no"),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, "gone"),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, "bad"),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_from_status_prefers_server_message() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, r#"{"message":"Plant not found"}"#);
        assert_eq!(err.to_string(), "Resource not found: Plant not found");

        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"db down"}"#);
        assert!(matches!(err, ApiError::ServerError(ref m) if m == "db down"));

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"message":"title too long"}"#);
        assert_eq!(err.to_string(), "Invalid response: Status 400 Bad Request: title too long");

        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, r#"{"error":"upstream"}"#);
        assert!(matches!(err, ApiError::ServerError(ref m) if m == r#"{"error":"upstream"}"#));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated, 800 total bytes"));
        assert_eq!(ApiError::truncate_body("short"), "short");
    }

    #[test]
    fn test_server_message() {
        assert_eq!(
            ApiError::server_message(r#"{"message":"Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
        assert_eq!(ApiError::server_message("<html>"), None);
        assert_eq!(ApiError::server_message(r#"{"error":1}"#), None);
    }
}
