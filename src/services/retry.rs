//! Bounded exponential backoff for remote calls.

use crate::clients::FetchError;
use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for a single backoff wait.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`, i.e. `base * multiplier^(attempt - 1)`,
    /// saturating at [`MAX_RETRY_DELAY`].
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        let seconds = self.base_delay.as_secs_f64() * factor;

        Duration::try_from_secs_f64(seconds)
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` is exhausted. The closure receives the 1-based
    /// attempt number.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `operation`.
    pub async fn execute<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            debug!(event = "remote_attempt", operation, attempt);
            metrics::counter!("remote_calls_total", "operation" => operation.to_string())
                .increment(1);

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => {
                    warn!(event = "remote_failed", operation, attempt, error = %err, "Non-retryable failure");
                    return Err(err);
                }
                Err(err) if attempt >= self.max_attempts => {
                    warn!(event = "remote_exhausted", operation, attempts = attempt, error = %err, "Retries exhausted");
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        event = "remote_retry",
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, backing off"
                    );
                    metrics::counter!("remote_retries_total", "operation" => operation.to_string())
                        .increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
