//! # Bounded Retry
//!
//! Every write transaction runs under a [`RetryPolicy`]. A retryable failure
//! (lock contention, a lost race on a UNIQUE position) rolls the transaction
//! back and runs it again from the start, so every attempt re-reads state.
//!
//! ```text
//! attempt 1 ──► Busy ──► sleep 1×base ──► attempt 2 ──► Busy ──► sleep 2×base
//!     ... ──► attempt N ──► error returned as-is (Busy → 409 Conflict)
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::DbResult;

/// How many times to run a transaction and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Wait before attempt `n + 1` is `n × base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        RetryPolicy::new(1, Duration::ZERO)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Retrying transaction"
                    );
                    tokio::time::sleep(self.base_delay * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));

        let result = policy
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DbError::Busy)
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: DbResult<()> = policy
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DbError::Busy)
            })
            .await;

        assert!(matches!(result, Err(DbError::Busy)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: DbResult<()> = policy
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DbError::not_found("Order", "missing"))
            })
            .await;

        assert!(matches!(result, Err(DbError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
