//! Retryability classification.
//!
//! [`ErrorClassifier`] is the single predicate the retry loop consults. The
//! substring matcher is kept for configuration-driven rules; typed errors are
//! mapped to a [`RetryClass`] first so fuzzy matching only applies to errors
//! that carry no structure.

use super::Cancelled;
use crate::error::ReviewError;
use llm::LlmError;
use regex::Regex;
use std::error::Error;
use std::sync::LazyLock;

/// A standalone 429 or 5xx status code; digits inside longer numbers or ids
/// do not count.
static STATUS_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:429|5\d\d)\b").expect("valid status code regex"));

/// Decides whether a failed attempt is worth retrying.
pub trait ErrorClassifier: Send + Sync {
    fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool;
}

impl<F> ErrorClassifier for F
where
    F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync,
{
    fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool {
        self(error)
    }
}

/// Retryable when the error message (including its sources) contains any of
/// the configured substrings, compared case-insensitively.
#[derive(Debug, Clone)]
pub struct SubstringClassifier {
    patterns: Vec<String>,
}

impl SubstringClassifier {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.patterns.iter().any(|p| message.contains(p.as_str()))
    }
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RETRYABLE_SUBSTRINGS)
    }
}

impl ErrorClassifier for SubstringClassifier {
    fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool {
        !is_cancellation(error) && self.matches(&error_chain_text(error))
    }
}

/// Substrings treated as transient when no other rule is configured.
pub const DEFAULT_RETRYABLE_SUBSTRINGS: &[&str] = &[
    "timeout",
    "connection reset",
    "rate limit",
    "too many requests",
    "server error",
    "internal server error",
    "service unavailable",
];

/// Typed failure category used for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Attempt or transport timeout
    Timeout,
    /// HTTP 429 or an equivalent provider message
    RateLimited,
    /// HTTP 5xx or service unavailable
    ServerError,
    /// Connection-level failure (reset, refused, DNS)
    Transport,
    /// 4xx other than 429, authentication and malformed requests
    ClientError,
    /// The run was cancelled or its deadline elapsed
    Cancelled,
    /// Nothing recognisable
    Unknown,
}

impl RetryClass {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            RetryClass::Timeout
                | RetryClass::RateLimited
                | RetryClass::ServerError
                | RetryClass::Transport
        )
    }
}

impl std::fmt::Display for RetryClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RetryClass::Timeout => "timeout",
            RetryClass::RateLimited => "rate_limited",
            RetryClass::ServerError => "server_error",
            RetryClass::Transport => "transport",
            RetryClass::ClientError => "client_error",
            RetryClass::Cancelled => "cancelled",
            RetryClass::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Classify an error, walking its source chain for a typed cause before
/// falling back to message inspection.
pub fn classify(error: &(dyn Error + 'static)) -> RetryClass {
    let mut current: Option<&(dyn Error + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(class) = classify_typed(err) {
            return class;
        }
        current = err.source();
    }
    classify_message(&error_chain_text(error))
}

/// True when the error (or any of its sources) is a cancellation.
pub fn is_cancellation(error: &(dyn Error + 'static)) -> bool {
    let mut current: Option<&(dyn Error + 'static)> = Some(error);
    while let Some(err) = current {
        if err.is::<Cancelled>() {
            return true;
        }
        if let Some(ReviewError::Cancelled(_)) = err.downcast_ref::<ReviewError>() {
            return true;
        }
        current = err.source();
    }
    false
}

fn classify_typed(err: &(dyn Error + 'static)) -> Option<RetryClass> {
    if err.is::<Cancelled>() {
        return Some(RetryClass::Cancelled);
    }
    if let Some(review) = err.downcast_ref::<ReviewError>() {
        return match review {
            ReviewError::Cancelled(_) => Some(RetryClass::Cancelled),
            ReviewError::Llm(llm) => Some(classify_llm_error(llm)),
            ReviewError::Io(io) => classify_io(io),
            ReviewError::Config(_) | ReviewError::Repository(_) => Some(RetryClass::ClientError),
            _ => None,
        };
    }
    if let Some(llm) = err.downcast_ref::<LlmError>() {
        return Some(classify_llm_error(llm));
    }
    if let Some(io) = err.downcast_ref::<std::io::Error>() {
        return classify_io(io);
    }
    if err.is::<tokio::time::error::Elapsed>() {
        return Some(RetryClass::Timeout);
    }
    None
}

/// Map a provider error to its retry class.
pub fn classify_llm_error(error: &LlmError) -> RetryClass {
    match error {
        LlmError::Timeout(_) => RetryClass::Timeout,
        LlmError::RateLimited(_) => RetryClass::RateLimited,
        LlmError::ServerError { .. } => RetryClass::ServerError,
        LlmError::HttpError(e) if e.is_timeout() => RetryClass::Timeout,
        LlmError::HttpError(e) => match e.status().map(|s| s.as_u16()) {
            Some(429) => RetryClass::RateLimited,
            Some(s) if s >= 500 => RetryClass::ServerError,
            Some(_) => RetryClass::ClientError,
            None if e.is_connect() || e.is_request() => RetryClass::Transport,
            None => classify_message(&e.to_string()),
        },
        LlmError::ClientError { .. }
        | LlmError::AuthenticationError(_)
        | LlmError::ApiKeyNotFound(_)
        | LlmError::InvalidRequest(_)
        | LlmError::UnsupportedProvider(_)
        | LlmError::ConfigError(_) => RetryClass::ClientError,
        LlmError::InvalidResponse(_) | LlmError::SerializationError(_) => RetryClass::Unknown,
    }
}

fn classify_io(error: &std::io::Error) -> Option<RetryClass> {
    use std::io::ErrorKind;
    match error.kind() {
        ErrorKind::TimedOut => Some(RetryClass::Timeout),
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionRefused
        | ErrorKind::BrokenPipe => Some(RetryClass::Transport),
        _ => None,
    }
}

/// Message-based classification for untyped errors.
pub fn classify_message(message: &str) -> RetryClass {
    let msg = message.to_lowercase();

    if msg.contains("cancelled") || msg.contains("canceled") {
        return RetryClass::Cancelled;
    }
    let status = STATUS_CODE_REGEX.find(&msg).map(|m| m.as_str());

    if status == Some("429")
        || msg.contains("rate limit")
        || msg.contains("rate_limit")
        || msg.contains("too many requests")
    {
        return RetryClass::RateLimited;
    }
    if msg.contains("timeout") || msg.contains("timed out") || msg.contains("deadline exceeded") {
        return RetryClass::Timeout;
    }
    if status.is_some_and(|code| code.starts_with('5'))
        || msg.contains("server error")
        || msg.contains("service unavailable")
        || msg.contains("bad gateway")
    {
        return RetryClass::ServerError;
    }
    if msg.contains("connection reset") || msg.contains("connection refused") {
        return RetryClass::Transport;
    }
    RetryClass::Unknown
}

/// Display of an error followed by each of its sources, joined by ": ".
pub fn error_chain_text(error: &(dyn Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut current = error.source();
    while let Some(err) = current {
        let part = err.to_string();
        if !text.contains(&part) {
            text.push_str(": ");
            text.push_str(&part);
        }
        current = err.source();
    }
    text
}
