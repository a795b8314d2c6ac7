//! Fixed-interval retry for resolution attempts

use crate::error::ResolveError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default pause between attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed delay between attempts
    pub interval: Duration,
    /// Attempt cap; `None` retries until success or cancellation
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails permanently, runs out of attempts or is cancelled.
    ///
    /// Only errors for which [`ResolveError::is_retryable`] holds are retried.
    /// `op` receives the 1-based attempt number.
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, ResolveError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ResolveError>>,
    {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }
            attempt += 1;

            let error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }
            if self.max_attempts.is_some_and(|max| attempt >= max) {
                warn!("Giving up after {} attempts: {}", attempt, error);
                return Err(ResolveError::AttemptsExhausted(attempt));
            }

            debug!(
                "Attempt {} failed ({}), retrying in {:?}",
                attempt, error, self.interval
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

/// Retry policy builder
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Create a new builder with the default policy
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
        }
    }

    /// Set delay between attempts
    pub fn interval(mut self, interval: Duration) -> Self {
        self.policy.interval = interval;
        self
    }

    /// Cap the number of attempts; zero means unbounded
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = (max_attempts > 0).then_some(max_attempts);
        self
    }

    /// Retry until success or cancellation
    pub fn unbounded(mut self) -> Self {
        self.policy.max_attempts = None;
        self
    }

    /// Build the retry policy
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };
    use tokio::time::Instant;

    fn not_ready() -> ResolveError {
        ResolveError::Engine(EngineError::NotReady("test".to_string()))
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, None);
    }

    #[test]
    fn test_retry_policy_builder() {
        let policy = RetryPolicyBuilder::new()
            .interval(Duration::from_millis(250))
            .max_attempts(5)
            .build();
        assert_eq!(policy.interval, Duration::from_millis(250));
        assert_eq!(policy.max_attempts, Some(5));

        let policy = RetryPolicyBuilder::new().max_attempts(0).build();
        assert_eq!(policy.max_attempts, None);

        let policy = RetryPolicyBuilder::default().max_attempts(3).unbounded().build();
        assert_eq!(policy.max_attempts, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_fixed_interval() {
        let policy = RetryPolicy::default();
        let counter = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = policy
            .run(&CancellationToken::new(), |_| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(not_ready())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_on_permanent_error() {
        let policy = RetryPolicy::default();
        let counter = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = policy
            .run(&CancellationToken::new(), |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ResolveError::Engine(EngineError::InvalidInput("bad".into())))
                }
            })
            .await;

        assert!(matches!(result, Err(ResolveError::Engine(EngineError::InvalidInput(_)))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_respects_max_attempts() {
        let policy = RetryPolicyBuilder::new().max_attempts(3).build();

        let result: Result<(), _> = policy
            .run(&CancellationToken::new(), |_| async { Err(not_ready()) })
            .await;

        assert_eq!(result, Err(ResolveError::AttemptsExhausted(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_cancelled_while_waiting() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            canceller.cancel();
        });

        let result: Result<(), _> = policy
            .run(&cancel, |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(not_ready())
                }
            })
            .await;

        assert_eq!(result, Err(ResolveError::Cancelled));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_not_started_when_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let counter = Arc::new(AtomicU32::new(0));

        let result = RetryPolicy::default()
            .run(&cancel, |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert_eq!(result, Err(ResolveError::Cancelled));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
