//! Error types for LLM provider implementations.

use thiserror::Error;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when talking to an LLM provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport failed (connection refused/reset, DNS, TLS, ...).
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Provider answered with 429.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Provider answered with a 5xx status.
    #[error("Server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Provider answered with a 4xx status other than 401/403/429.
    #[error("Client error (status {status}): {message}")]
    ClientError { status: u16, message: String },

    /// API authentication failed (401/403).
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// API key not found in configuration or environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Invalid request parameters, rejected before sending.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response body could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No factory registered under the requested provider name.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Failed to serialize/deserialize data.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LlmError {
    /// Map a non-success HTTP status and its body to a typed error.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            429 => LlmError::RateLimited(if message.is_empty() {
                "rate limit exceeded".to_string()
            } else {
                message
            }),
            401 | 403 => LlmError::AuthenticationError(message),
            500..=599 => LlmError::ServerError { status, message },
            _ => LlmError::ClientError { status, message },
        }
    }

    /// Check if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::Timeout(_) | LlmError::RateLimited(_) | LlmError::ServerError { .. } => true,
            _ => false,
        }
    }

    /// Check if this error is due to authentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            LlmError::AuthenticationError(_) | LlmError::ApiKeyNotFound(_)
        )
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::RateLimited(_) => Some(429),
            LlmError::ServerError { status, .. } | LlmError::ClientError { status, .. } => {
                Some(*status)
            }
            LlmError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(LlmError::from_status(429, ""), LlmError::RateLimited(_)));
        assert!(matches!(
            LlmError::from_status(401, "bad key"),
            LlmError::AuthenticationError(_)
        ));
        assert!(matches!(
            LlmError::from_status(503, "down"),
            LlmError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            LlmError::from_status(400, "bad"),
            LlmError::ClientError { status: 400, .. }
        ));
    }

    #[test]
    fn test_retryable_variants() {
        assert!(LlmError::Timeout("slow".into()).is_retryable());
        assert!(LlmError::from_status(429, "").is_retryable());
        assert!(LlmError::from_status(502, "").is_retryable());
        assert!(!LlmError::from_status(400, "").is_retryable());
        assert!(!LlmError::from_status(401, "").is_retryable());
        assert!(!LlmError::InvalidRequest("x".into()).is_retryable());
    }

    #[test]
    fn test_rate_limit_message_defaults() {
        let err = LlmError::from_status(429, "");
        assert_eq!(err.to_string(), "Rate limit exceeded: rate limit exceeded");
        assert_eq!(err.status(), Some(429));
    }
}
