//! Error types for the review pipeline.

use llm::LlmError;
use thiserror::Error;

/// Result type alias for review operations
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Main error type for review operations
#[derive(Debug, Error)]
pub enum ReviewError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Repository inspection failed (not a repo, git failure, ...)
    #[error("Repository error: {0}")]
    Repository(String),

    /// LLM transport failure, after retries where applicable
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The run deadline elapsed or the run was interrupted
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// The review task for a file panicked
    #[error("Review task panicked: {0}")]
    Panicked(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl ReviewError {
    /// Whether this error means "ran out of time / interrupted" rather than
    /// "the model or service rejected the request".
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReviewError::Cancelled(_))
    }

    /// Short category label used in reports and logs.
    pub fn category(&self) -> &'static str {
        match self {
            ReviewError::Config(_) => "config",
            ReviewError::Repository(_) => "repository",
            ReviewError::Llm(e) if e.is_auth_error() => "authentication",
            ReviewError::Llm(e) if e.is_retryable() => "transport",
            ReviewError::Llm(_) => "request",
            ReviewError::Cancelled(_) => "cancelled",
            ReviewError::Panicked(_) => "panic",
            ReviewError::Io(_) => "io",
            ReviewError::Serialization(_) => "serialization",
            ReviewError::Other(_) => "other",
        }
    }
}

impl From<crate::retry::Cancelled> for ReviewError {
    fn from(err: crate::retry::Cancelled) -> Self {
        ReviewError::Cancelled(err.to_string())
    }
}

impl From<serde_json::Error> for ReviewError {
    fn from(err: serde_json::Error) -> Self {
        ReviewError::Serialization(err.to_string())
    }
}

impl From<String> for ReviewError {
    fn from(msg: String) -> Self {
        ReviewError::Other(msg)
    }
}

impl From<&str> for ReviewError {
    fn from(msg: &str) -> Self {
        ReviewError::Other(msg.to_string())
    }
}
