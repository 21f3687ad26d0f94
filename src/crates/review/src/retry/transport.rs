//! LLM-specific retry layer.

use super::classify::{classify, ErrorClassifier, RetryClass, SubstringClassifier};
use super::{retry_with_backoff, RetryPolicy};
use crate::error::{Result, ReviewError};
use llm::HttpReply;
use std::error::Error;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Retries timeouts, rate limits, 5xx and connection failures; everything
/// else (4xx, authentication, malformed requests) is fatal.
///
/// Extra substrings only widen classification for errors that carry no
/// typed cause; they never turn a typed client error retryable.
#[derive(Debug, Clone, Default)]
pub struct LlmErrorClassifier {
    extra: Option<SubstringClassifier>,
}

impl LlmErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extra_substrings<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra = SubstringClassifier::new(patterns);
        Self {
            extra: (!extra.patterns().is_empty()).then_some(extra),
        }
    }
}

impl ErrorClassifier for LlmErrorClassifier {
    fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool {
        match classify(error) {
            RetryClass::Unknown => self
                .extra
                .as_ref()
                .map(|extra| extra.is_retryable(error))
                .unwrap_or(false),
            class => class.is_retryable(),
        }
    }
}

/// Run one raw provider exchange under `policy`.
///
/// A reply with status 429 becomes a retryable rate-limit error even when the
/// transport reported success; other non-2xx statuses become typed errors
/// before classification. Unless the policy carries its own predicate, the
/// LLM classifier is used, widened by the policy's substring list.
pub async fn llm_request_with_retry<F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    cancel: &CancellationToken,
    mut send: F,
) -> Result<HttpReply>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = llm::Result<HttpReply>>,
{
    let effective;
    let policy = if policy.has_predicate() {
        policy
    } else {
        effective = policy.clone().with_predicate(LlmErrorClassifier::with_extra_substrings(
            &policy.retryable_errors,
        ));
        &effective
    };

    retry_with_backoff(policy, operation_name, cancel, || {
        let pending = send();
        async move {
            let reply = pending.await?;
            if reply.status == 429 {
                warn!(operation = %operation_name, "Provider answered 429, treating as rate limit");
            }
            reply.error_for_status().map_err(ReviewError::from)
        }
    })
    .await
}
