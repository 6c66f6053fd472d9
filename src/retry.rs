//! Explicit retry policy for network call sites.
//!
//! Call sites hold a `RetryPolicy` value and wrap individual operations in
//! `run`, so the retry behavior of every call is visible where the call is
//! made. Errors opt into retrying through the `Transient` trait; permanent
//! failures (bad credentials, rate-limit lockouts, garbage pages) return
//! immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;

/// Classification hook: only transient errors are worth retrying.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;

                    if !e.is_transient() || attempt >= self.max_attempts {
                        return Err(e);
                    }

                    let backoff = std::cmp::min(
                        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt - 1)),
                        self.backoff_max,
                    );

                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying after transient failure"
                    );

                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        transient: bool,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (transient: {})", self.transient)
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(40),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = policy()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError { transient: true })
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_do_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = policy()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { transient: false }) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = policy()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { transient: true }) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
