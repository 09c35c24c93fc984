//! Bounded exponential backoff for calls to external services.
//!
//! A single [`RetryPolicy`] shape is shared by the embedding client, the
//! generation client and the pgvector store so that every remote call obeys
//! the same rules: transient errors are repeated up to `max_attempts` times,
//! fatal errors surface on the first occurrence.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RagError, Result};

/// Serializable retry settings, part of [`RagConfig`](crate::RagConfig).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Time limit for one attempt, in milliseconds.
    pub attempt_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            attempt_timeout_ms: 60_000,
        }
    }
}

/// Decides whether an error should be retried.
pub type RetryPredicate = fn(&RagError) -> bool;

/// Retry policy with exponential backoff and a retryable-error predicate.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::RetryPolicy;
///
/// let policy = RetryPolicy::new(5).with_initial_backoff(Duration::from_millis(200));
/// let vectors = policy.run("embed_batch", || provider.embed_batch(&texts)).await?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: u32,
    attempt_timeout: Duration,
    retry_if: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create a policy making at most `max_attempts` attempts (minimum 1).
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), ..Self::default() }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1)
    }

    /// Build a policy from its serializable form.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: 2,
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
            retry_if: RagError::is_retryable,
        }
    }

    /// Set the delay before the second attempt.
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    /// Cap every delay at `delay`.
    pub fn with_max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    /// Bound every attempt made through [`run_timed`](Self::run_timed).
    pub fn with_attempt_timeout(mut self, limit: Duration) -> Self {
        self.attempt_timeout = limit;
        self
    }

    /// Replace the retryable-error predicate.
    pub fn with_predicate(mut self, retry_if: RetryPredicate) -> Self {
        self.retry_if = retry_if;
        self
    }

    /// Total number of attempts this policy makes.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Time limit for one attempt made through [`run_timed`](Self::run_timed).
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Run `operation`, retrying retryable failures with backoff.
    ///
    /// Returns the first success, the first non-retryable error, or the last
    /// error once all attempts are used up.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && (self.retry_if)(&e) => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Like [`run`](Self::run), with every attempt bounded by the attempt
    /// timeout. An attempt that runs out of time fails with the error built by
    /// `on_timeout`, which is retried like any other when the predicate allows.
    pub async fn run_timed<T, F, Fut, E>(
        &self,
        operation: &str,
        mut f: F,
        on_timeout: E,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        E: Fn(Duration) -> RagError,
    {
        let limit = self.attempt_timeout;
        let on_timeout = &on_timeout;
        self.run(operation, || {
            let attempt = f();
            async move {
                match tokio::time::timeout(limit, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(on_timeout(limit)),
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn backoff_doubles_and_is_capped() {
        let policy = RetryPolicy::new(10)
            .with_initial_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_millis(1_000));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(1_000));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
        let config = RetryConfig { max_attempts: 0, ..RetryConfig::default() };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3);

        let result = policy
            .run("flaky", || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(RagError::embedding_transient("mock", "rate limited"))
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
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(4);

        let result: Result<()> = policy
            .run("always_down", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(RagError::StoreUnavailable {
                        backend: "mock".into(),
                        message: "connection refused".into(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(RagError::StoreUnavailable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(5);

        let result: Result<()> = policy
            .run("unauthorized", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(RagError::generation_fatal("mock", "401 unauthorized"))
                }
            })
            .await;

        assert!(matches!(result, Err(RagError::GenerationError { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_that_hang_time_out_and_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3).with_attempt_timeout(Duration::from_secs(5));

        let result: Result<()> = policy
            .run_timed(
                "hangs",
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::future::pending::<Result<()>>().await
                    }
                },
                |limit| RagError::generation_transient("mock", format!("{limit:?} elapsed")),
            )
            .await;

        assert!(matches!(
            result,
            Err(RagError::GenerationError { kind: crate::ErrorKind::Transient, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_attempts_are_not_cut_short() {
        let policy = RetryPolicy::new(1).with_attempt_timeout(Duration::from_secs(5));
        let result = policy
            .run_timed(
                "quick",
                || async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(7)
                },
                |_| RagError::embedding_transient("mock", "timed out"),
            )
            .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_predicate_overrides_default() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3).with_predicate(|_| false);

        let result: Result<()> = policy
            .run("no_retry", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(RagError::embedding_transient("mock", "503"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
