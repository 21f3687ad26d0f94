//! Generic retry loop.

use super::classify::is_cancellation;
use super::{Cancelled, RetryPolicy};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Execute an async operation with exponential back-off and jitter.
///
/// The operation runs at most `policy.max_retries + 1` times. A failure the
/// policy does not consider retryable is returned at once; after the last
/// attempt the final error is returned unmodified. Cancellation is checked
/// before every attempt and races both the attempt and the back-off sleep.
///
/// # Arguments
/// * `policy` - Retry policy
/// * `operation_name` - Name used in log fields
/// * `cancel` - Run-level cancellation token
/// * `operation` - Async function to execute
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    cancel: &CancellationToken,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::error::Error + From<Cancelled> + 'static,
{
    let max_attempts = policy.max_retries.saturating_add(1);
    let mut backoff = policy.backoff();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        if cancel.is_cancelled() {
            debug!(operation = %operation_name, attempt, "Cancelled before attempt");
            return Err(Cancelled::new(format!(
                "{} cancelled before attempt {}",
                operation_name, attempt
            ))
            .into());
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Cancelled::new(format!(
                    "{} cancelled during attempt {}",
                    operation_name, attempt
                ))
                .into());
            }
            outcome = operation() => outcome,
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = %operation_name, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if is_cancellation(&err) {
            return Err(err);
        }

        if !policy.is_retryable(&err) {
            debug!(
                operation = %operation_name,
                attempt,
                error = %err,
                "Non-retryable error, giving up"
            );
            return Err(err);
        }

        if attempt >= max_attempts {
            warn!(
                operation = %operation_name,
                attempts = attempt,
                error = %err,
                "Operation failed, max retries exhausted"
            );
            return Err(err);
        }

        let delay = policy.jittered(backoff.next_delay());
        warn!(
            operation = %operation_name,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Operation failed, will retry"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Cancelled::new(format!(
                    "{} cancelled during retry back-off",
                    operation_name
                ))
                .into());
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReviewError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
            .with_jitter_factor(0.0)
    }

    #[tokio::test]
    async fn test_succeeds_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<u32, ReviewError> = retry_with_backoff(
            &fast_policy(3),
            "test-op",
            &CancellationToken::new(),
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<&str, ReviewError> = retry_with_backoff(
            &fast_policy(5),
            "test-op",
            &CancellationToken::new(),
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ReviewError::Other("rate limit exceeded".into()))
                    } else {
                        Ok("done")
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_unmodified() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), ReviewError> = retry_with_backoff(
            &fast_policy(2),
            "test-op",
            &CancellationToken::new(),
            || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(ReviewError::Other(format!("timeout #{}", n)))
                }
            },
        )
        .await;

        assert_eq!(result.unwrap_err().to_string(), "timeout #3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancel_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), ReviewError> =
            retry_with_backoff(&fast_policy(3), "test-op", &token, || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let policy = RetryPolicy::default()
            .with_max_retries(5)
            .with_initial_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(10))
            .with_jitter_factor(0.0);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result: Result<(), ReviewError> =
            retry_with_backoff(&policy, "test-op", &token, || async {
                Err(ReviewError::Other("service unavailable".into()))
            })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
