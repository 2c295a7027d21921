//! Retry configuration, delay calculation and timeout helpers.
//!
//! Concrete providers wrap their backend calls in [`with_timeout`] (so an
//! expired deadline surfaces as [`ParlayError::Timeout`], distinct from a
//! connectivity failure) and [`with_retry`] (capped exponential backoff for
//! transient failures only).

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::telemetry;
use crate::{ParlayError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// ```rust
/// # use parlay_gateway::providers::retry::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 4 (three retries).
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 10s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Config for a provider's `retries` setting (retries after the first attempt).
    pub fn from_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            ..Self::default()
        }
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (0-indexed):
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Delay honouring a server `retry_after` hint when present.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after
            .map(|hint| hint.min(self.max_delay))
            .unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Execute an async operation with retry logic.
///
/// Retries on transient errors (as classified by [`ParlayError::is_transient()`])
/// up to `config.max_attempts`. Permanent errors are returned immediately.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    operation: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts.max(1) {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                if attempt + 1 < config.max_attempts {
                    metrics::counter!(telemetry::RETRIES_TOTAL,
                        "provider" => provider_name.to_owned(),
                        "operation" => operation.to_owned(),
                    )
                    .increment(1);
                    let delay = config.effective_delay(attempt, e.retry_after());
                    warn!(
                        provider = provider_name,
                        operation,
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        ParlayError::Configuration(format!("{operation}: retry loop ran zero attempts"))
    }))
}

/// Bound a future by `timeout`, mapping expiry to [`ParlayError::Timeout`].
pub(crate) async fn with_timeout<Fut, T>(timeout: Duration, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(|e| match e {
            // reqwest reports its own timeouts without the configured limit
            ParlayError::Timeout(d) if d.is_zero() => ParlayError::Timeout(timeout),
            other => other,
        }),
        Err(_) => Err(ParlayError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig::new()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(1))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(350));
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(350));
    }

    #[test]
    fn from_retries_counts_initial_attempt() {
        assert_eq!(RetryConfig::from_retries(3).max_attempts, 4);
        assert_eq!(RetryConfig::from_retries(0).max_attempts, 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "mock", "op", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ParlayError::Http("reset".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast(), "mock", "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ParlayError::AuthenticationFailed)
        })
        .await;
        assert!(matches!(result, Err(ParlayError::AuthenticationFailed)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let result: Result<()> = with_retry(&fast(), "mock", "op", || async {
            Err(ParlayError::Api {
                status: 503,
                message: "down".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(ParlayError::Api { status: 503, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_distinct_from_connectivity() {
        let result: Result<()> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, ParlayError::Timeout(d) if d == Duration::from_millis(50)));
    }
}
