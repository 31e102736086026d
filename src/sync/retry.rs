//! Retry manager for handling transient failures with a fixed backoff
//!
//! Upstream outages are assumed short and attempts cheap, so every retry
//! waits the same configured delay. The number of retries is unbounded
//! unless `max_retries` is set.

use crate::config::RetryConfig;
use crate::error::RetryableError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry manager with fixed backoff support
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    /// Create a new RetryManager with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a RetryManager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Execute an async operation with retry logic
    ///
    /// The operation is retried while it returns a retryable error and
    /// `max_retries` (if any) is not exhausted, sleeping [`Self::backoff`]
    /// between attempts. Non-retryable errors are returned immediately.
    ///
    /// The returned future can be dropped at any point (for example from a
    /// `tokio::select!` on a shutdown signal) to stop retrying.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    if let Some(max_retries) = self.config.max_retries {
                        if attempt >= max_retries {
                            warn!(
                                attempts = attempt + 1,
                                max_retries = max_retries,
                                "Max retries exhausted"
                            );
                            return Err(err);
                        }
                    }

                    let backoff = self.backoff();
                    warn!(
                        attempt = attempt + 1,
                        backoff_secs = backoff.as_secs(),
                        error = %err,
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(backoff).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    /// Delay between two attempts
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.config.backoff_secs)
    }

    /// Get the retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn timeout() -> SourceError {
        SourceError::Timeout("connect timeout".to_string())
    }

    // Test 1: Success on first attempt returns immediately
    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let manager = RetryManager::new(RetryConfig {
            backoff_secs: 20,
            max_retries: None,
        });

        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();
        let start = Instant::now();

        let result: Result<&str, SourceError> = manager
            .execute(|| {
                let count = call_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok("connected")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    // Test 2: k timeouts then success means k retries with a fixed delay
    #[tokio::test(start_paused = true)]
    async fn test_fixed_backoff_between_retries() {
        let manager = RetryManager::new(RetryConfig {
            backoff_secs: 20,
            max_retries: None,
        });

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();
        let start = Instant::now();

        let result: Result<&str, SourceError> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    let current = count.fetch_add(1, Ordering::SeqCst);
                    if current < 4 {
                        Err(timeout())
                    } else {
                        Ok("connected")
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        // Initial attempt + 4 retries
        assert_eq!(attempt_count.load(Ordering::SeqCst), 5);
        // Fixed, not exponential: 4 * 20s
        assert_eq!(start.elapsed(), Duration::from_secs(80));
    }

    // Test 3: Unbounded retries keep going
    #[tokio::test(start_paused = true)]
    async fn test_unbounded_retries() {
        let manager = RetryManager::new(RetryConfig {
            backoff_secs: 1,
            max_retries: None,
        });

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), SourceError> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    let current = count.fetch_add(1, Ordering::SeqCst);
                    if current < 500 {
                        Err(timeout())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 501);
    }

    // Test 4: Gives up after max retries when capped
    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let manager = RetryManager::new(RetryConfig {
            backoff_secs: 5,
            max_retries: Some(2),
        });

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), SourceError> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(timeout())
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), timeout());
        // Initial attempt + max_retries
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    // Test 5: Non-retryable error returns immediately
    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_returns_immediately() {
        let manager = RetryManager::new(RetryConfig {
            backoff_secs: 20,
            max_retries: None,
        });

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();
        let start = Instant::now();

        let result: Result<(), SourceError> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::Forbidden)
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), SourceError::Forbidden);
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    // Test 6: Zero max_retries still allows initial attempt
    #[tokio::test(start_paused = true)]
    async fn test_zero_max_retries() {
        let manager = RetryManager::new(RetryConfig {
            backoff_secs: 20,
            max_retries: Some(0),
        });

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), SourceError> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(timeout())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    // Test 7: Default configuration
    #[test]
    fn test_default_configuration() {
        let manager = RetryManager::with_defaults();

        assert_eq!(manager.config().backoff_secs, 20);
        assert_eq!(manager.config().max_retries, None);
        assert_eq!(manager.backoff(), Duration::from_secs(20));
    }

    // Test 8: Dropping the future stops retrying
    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_retries() {
        let manager = RetryManager::new(RetryConfig {
            backoff_secs: 10,
            max_retries: None,
        });

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let retry = manager.execute(|| {
            let count = attempt_count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(timeout())
            }
        });

        let result = tokio::time::timeout(Duration::from_secs(25), retry).await;
        assert!(result.is_err());

        // Attempts at t=0, 10, 20
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }
}
