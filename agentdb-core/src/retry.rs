//! Exponential-backoff retry for durability-touching operations.
//!
//! File writes, snapshot saves and relational transactions all run through
//! [`with_retry`]. Transient storage faults back off and retry; validation
//! and structural errors pass straight through untouched.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{AgentDbError, AgentDbResult};

/// Retry policy: number of retries after the first attempt, base delay,
/// and a cap on the computed backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (zero-based): `base * 2^attempt`,
    /// capped at `max_delay_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = if attempt >= 31 { u64::MAX } else { 1u64 << attempt };
        let delay = self
            .base_delay_ms
            .checked_mul(factor)
            .unwrap_or(self.max_delay_ms);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Runs `operation` up to `1 + max_retries` times, sleeping with
/// exponential backoff between transient failures. Exhaustion surfaces
/// [`AgentDbError::RetryExhausted`] carrying the last cause; non-transient
/// errors return immediately on the first occurrence.
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> AgentDbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AgentDbResult<T>>,
{
    let attempts = policy.max_retries + 1;
    let mut last_error = None;

    for attempt in 0..attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    error = %err,
                    "transient failure, will retry"
                );
                last_error = Some(err);
                if attempt + 1 < attempts {
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
            }
        }
    }

    Err(AgentDbError::RetryExhausted {
        operation: operation_name.to_string(),
        attempts,
        source: Box::new(last_error.expect("at least one attempt ran")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{StorageError, ValidationError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> AgentDbError {
        AgentDbError::Storage(StorageError::sqlite("disk I/O error"))
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_millis(2_000));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy {
            base_delay_ms: 1,
            max_delay_ms: 2,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);
        let result = with_retry("test_op", &policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(transient())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_wraps_last_error() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        };
        let result: AgentDbResult<()> =
            with_retry("always_fails", &policy, || async { Err(transient()) }).await;
        match result.unwrap_err() {
            AgentDbError::RetryExhausted {
                operation,
                attempts,
                ..
            } => {
                assert_eq!(operation, "always_fails");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn validation_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: AgentDbResult<()> = with_retry("validate", &policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AgentDbError::Validation(ValidationError::ZeroVector {
                    context: "t".into(),
                }))
            }
        })
        .await;
        assert!(matches!(result, Err(AgentDbError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
