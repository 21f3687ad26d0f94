//! Retry logic with exponential backoff
//!
//! Provides the immutable [`RetryPolicy`], the generic cancellable retry loop
//! and the LLM-specific classification layer on top of it.

pub mod backoff;
pub mod classify;
pub mod executor;
pub mod transport;

pub use backoff::{apply_jitter, Backoff};
pub use classify::{
    classify, classify_llm_error, ErrorClassifier, RetryClass, SubstringClassifier,
    DEFAULT_RETRYABLE_SUBSTRINGS,
};
pub use executor::retry_with_backoff;
pub use transport::{llm_request_with_retry, LlmErrorClassifier};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Marker error produced when a retry loop is interrupted by cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancelled {
    reason: String,
}

impl Cancelled {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

impl Error for Cancelled {}

/// Retry policy, built once per run.
///
/// Retryability is decided by a custom predicate when one is set, otherwise
/// by case-insensitive substring matching against `retryable_errors`.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Growth factor between successive delays
    pub backoff_factor: f64,

    /// Symmetric jitter as a fraction of the delay, in [0, 1]
    pub jitter_factor: f64,

    /// Substrings marking an error message as transient
    pub retryable_errors: Vec<String>,

    predicate: Option<Arc<dyn ErrorClassifier>>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(5000),
            backoff_factor: 2.0,
            jitter_factor: 0.1,
            retryable_errors: DEFAULT_RETRYABLE_SUBSTRINGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            predicate: None,
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("jitter_factor", &self.jitter_factor)
            .field("retryable_errors", &self.retryable_errors)
            .field("custom_predicate", &self.predicate.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn disabled() -> Self {
        Self::default().with_max_retries(0)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn with_retryable_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_errors = errors.into_iter().map(Into::into).collect();
        self
    }

    /// Replace substring matching with a custom predicate.
    pub fn with_predicate<C>(mut self, classifier: C) -> Self
    where
        C: ErrorClassifier + 'static,
    {
        self.predicate = Some(Arc::new(classifier));
        self
    }

    pub fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    /// Whether a failed attempt should be retried under this policy.
    pub fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool {
        match &self.predicate {
            Some(predicate) => predicate.is_retryable(error),
            None => SubstringClassifier::new(&self.retryable_errors).is_retryable(error),
        }
    }

    /// Fresh un-jittered delay schedule.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_delay, self.max_delay, self.backoff_factor)
    }

    /// Apply this policy's jitter to a scheduled delay.
    pub fn jittered(&self, delay: Duration) -> Duration {
        apply_jitter(delay, self.jitter_factor)
    }

    /// Total number of attempts, first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_millis(5000));
        assert_eq!(policy.backoff_factor, 2.0);
        assert_eq!(policy.jitter_factor, 0.1);
        assert!(!policy.has_predicate());
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_substring_rules_apply_without_predicate() {
        let policy = RetryPolicy::default().with_retryable_errors(["quota"]);
        assert!(!policy.is_retryable(&Cancelled::new("quota")));
        assert!(policy.is_retryable(&crate::error::ReviewError::Other("Quota exhausted".into())));
        assert!(!policy.is_retryable(&crate::error::ReviewError::Other("rate limit".into())));
    }

    #[test]
    fn test_predicate_overrides_substrings() {
        let policy = RetryPolicy::default().with_predicate(|_: &(dyn Error + 'static)| false);
        assert!(policy.has_predicate());
        assert!(!policy.is_retryable(&crate::error::ReviewError::Other("rate limit".into())));
    }

    #[test]
    fn test_disabled_policy() {
        assert_eq!(RetryPolicy::disabled().max_attempts(), 1);
    }
}
