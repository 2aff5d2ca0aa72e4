//! Bounded retry with a fixed delay.
//!
//! Errors decide for themselves whether another attempt makes sense through
//! [`Retryable`]. A well-formed "nothing yet" answer is a successful result
//! (usually `Ok(None)`) and never consumes an attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Classification of a failure for [`RetryPolicy`].
pub trait Retryable {
    /// `true` for transient failures (network, HTTP), `false` for fatal ones.
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_ATTEMPTS, DEFAULT_DELAY)
    }
}

impl RetryPolicy {
    /// A policy making at most `max_attempts` attempts, `delay` apart.
    ///
    /// `max_attempts` is clamped to at least one.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned
    /// unchanged. There is no overall deadline; wrap the call in
    /// `tokio::time::timeout` if one is needed.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        error = %e,
                        "Giving up after final attempt"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Transient failure, retrying"
                    );
                }
            }
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use thiserror::Error;

    #[derive(Debug, Error)]
    enum TestError {
        #[error("connection reset")]
        Transient,
        #[error("missing credentials")]
        Fatal,
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    /// Fails transiently `failures` times, then returns the attempt number.
    async fn flaky(calls: Arc<AtomicU32>, failures: u32) -> Result<u32, TestError> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= failures {
            Err(TestError::Transient)
        } else {
            Ok(n)
        }
    }

    fn instant() -> RetryPolicy {
        RetryPolicy::fixed(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_three_failures_exhaust_before_fourth_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = instant()
            .run("test", |_| flaky(calls.clone(), 3))
            .await;
        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_two_failures_then_success_returns_third_result() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = instant()
            .run("test", |_| flaky(calls.clone(), 2))
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = instant()
            .run("test", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Fatal)
                }
            })
            .await;
        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_result_is_not_a_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<Option<String>, TestError> = instant()
            .run("test", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            })
            .await;
        assert_eq!(result.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_numbers_are_passed_through() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let _: Result<(), TestError> = instant()
            .run("test", |attempt| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(attempt);
                    Err(TestError::Transient)
                }
            })
            .await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_waits_two_seconds_between_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();
        let result = RetryPolicy::default()
            .run("test", |_| flaky(calls.clone(), 2))
            .await;
        assert_eq!(result.unwrap(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).max_attempts(), 1);
    }
}
