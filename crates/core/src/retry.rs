//! Bounded retries for provider calls.

use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Fixed-backoff retry policy. `retries` counts attempts after the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            backoff: Duration::ZERO,
        }
    }
}

/// Runs `operation` with each attempt capped at `timeout`, retrying transient
/// failures up to `policy.retries` times.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    timeout: Duration,
    label: &str,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt > policy.retries || !error.is_retryable() {
                    return Err(error);
                }

                warn!(operation = label, attempt, error = %error, "retrying provider call");
                tokio::time::sleep(policy.backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let calls = AtomicU32::new(0);
        let result = with_retry(quick(1), Duration::from_secs(5), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProviderError::Timeout(Duration::from_millis(1)))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.ok(), Some("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(quick(3), Duration::from_secs(5), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::InvalidResponse("empty".to_string()))
        })
        .await;

        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_attempt_becomes_timeout() {
        let result: Result<(), _> =
            with_retry(RetryPolicy::none(), Duration::from_millis(10), "test", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Timeout(_))));
    }
}
