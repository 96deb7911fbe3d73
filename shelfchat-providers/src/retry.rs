//! Rate-limit retry with linear backoff.

use crate::error::ProviderResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retries an operation while it reports a rate limit.
///
/// The n-th retry waits `base_delay * n`, or the server's `Retry-After` when
/// one was sent. Any other error is returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRetry {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay unit.
    pub base_delay: Duration,
}

impl Default for RateLimitRetry {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(800),
        }
    }
}

impl RateLimitRetry {
    /// Create the default policy: 2 retries, 800 ms unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Never retry.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Set max retries.
    #[must_use]
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the delay unit.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }

    /// Run `operation`, retrying on rate limits.
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Err(error) if error.is_rate_limited() && retry < self.max_retries => {
                    retry += 1;
                    let wait = error.retry_after().unwrap_or_else(|| self.delay_for(retry));
                    debug!(
                        provider = %label,
                        retry,
                        max_retries = self.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    sleep(wait).await;
                }
                Err(error) => {
                    if error.is_rate_limited() {
                        warn!(provider = %label, retries = retry, "Rate limit retries exhausted");
                    }
                    return Err(error);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_linear_delay() {
        let retry = RateLimitRetry::new();
        assert_eq!(retry.delay_for(1), Duration::from_millis(800));
        assert_eq!(retry.delay_for(2), Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limits_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = tokio::time::Instant::now();

        let result = RateLimitRetry::new()
            .run("test", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ProviderError::rate_limited(None))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(2400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: ProviderResult<()> = RateLimitRetry::new()
            .run("test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::rate_limited(None)) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: ProviderResult<()> = RateLimitRetry::new()
            .run("test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::http(500, "boom")) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Http { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
