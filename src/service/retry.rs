//! Bounded, rate-limit-aware retries around remote calls.
//!
//! [`RetryExecutor::run`] re-issues an operation according to the class of
//! each failure:
//!
//! - `PermissionDenied` and `Validation` are terminal and propagate at once.
//! - `RateLimited` waits the server-provided hint (or the backoff when the
//!   hint is missing) and consumes one attempt.
//! - Anything else waits `base_delay * 2^(attempt - 1)`.
//!
//! Once the attempt budget is spent the last error is wrapped in
//! [`BackupError::RetriesExhausted`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BackupError;
use crate::remote::RemoteError;

/// Attempt budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Zero is treated as one.
    pub max_attempts: u32,
    /// Backoff base.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    /// (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1_u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Runs remote operations under a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Creates an executor.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs `operation` until it succeeds, fails terminally, or the budget
    /// is spent. `label` names the call in logs.
    ///
    /// # Errors
    ///
    /// - [`BackupError::PermissionDenied`] / [`BackupError::Validation`]
    ///   on the first terminal failure.
    /// - [`BackupError::RetriesExhausted`] wrapping the last transient
    ///   failure.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, BackupError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() {
                tracing::debug!(label, attempt, error = %err, "terminal remote failure");
                return Err(err.into());
            }
            if attempt >= max_attempts {
                tracing::warn!(label, attempts = attempt, error = %err, "retries exhausted");
                return Err(BackupError::RetriesExhausted {
                    attempts: attempt,
                    source: err,
                });
            }
            let wait = match &err {
                RemoteError::RateLimited {
                    retry_after: Some(hint),
                } => *hint,
                _ => self.policy.backoff(attempt),
            };
            tracing::debug!(
                label,
                attempt,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "retrying remote call"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    fn executor() -> RetryExecutor {
        RetryExecutor::new(RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), BackupError> = executor()
            .run("test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(RemoteError::PermissionDenied("manage roles".into())) }
            })
            .await;
        assert!(matches!(result, Err(BackupError::PermissionDenied(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn validation_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), BackupError> = executor()
            .run("test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(RemoteError::Validation("name too long".into())) }
            })
            .await;
        assert!(matches!(result, Err(BackupError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_back_off_exponentially() {
        let start = Instant::now();
        let stamps = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&stamps);
        let result = executor()
            .run("test", || {
                let log = Arc::clone(&log);
                async move {
                    let mut log = log.lock().await;
                    log.push(start.elapsed());
                    if log.len() < 3 {
                        Err(RemoteError::Unknown("502".into()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert!(matches!(result, Ok(7)));

        let stamps = stamps.lock().await;
        assert_eq!(stamps.len(), 3);
        let (Some(first), Some(second), Some(third)) =
            (stamps.first(), stamps.get(1), stamps.get(2))
        else {
            panic!("missing attempts");
        };
        assert_eq!(*second - *first, Duration::from_millis(1000));
        assert_eq!(*third - *second, Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_for_hint() {
        let start = Instant::now();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = executor()
            .run("test", || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(RemoteError::RateLimited {
                            retry_after: Some(Duration::from_millis(4500)),
                        })
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_millis(4500));
        assert!(start.elapsed() < Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_wraps_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), BackupError> = executor()
            .run("test", || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Err(RemoteError::Unknown(format!("failure {n}"))) }
            })
            .await;
        let Err(BackupError::RetriesExhausted { attempts, source }) = result else {
            panic!("expected RetriesExhausted");
        };
        assert_eq!(attempts, 3);
        assert_eq!(source, RemoteError::Unknown("failure 2".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }
}
