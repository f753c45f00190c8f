//! Retry logic with exponential backoff
//!
//! Used for background reads only. Mutations are sent once.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    pub max_retries: usize,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (e.g., 2.0 for doubling)
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new(max_retries: usize, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate delay for a given retry number (0-indexed)
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }
}

/// Final failure of a retried operation.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Total attempts made, including the first
    pub attempts: usize,
    pub last_error: E,
}

/// Execute an operation, retrying retryable failures with backoff.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `label` - What is being fetched, for logging
/// * `is_retryable` - Decides whether a failure is worth another attempt
/// * `operation` - Async function to execute
pub async fn with_retry<F, Fut, T, E, P>(
    config: &RetryConfig,
    label: &str,
    is_retryable: P,
    mut operation: F,
) -> std::result::Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(label = %label, attempt = attempt + 1, "Retry succeeded");
                }
                return Ok(result);
            }
            Err(e) => {
                let attempts = attempt + 1;
                if attempt >= config.max_retries || !is_retryable(&e) {
                    warn!(
                        label = %label,
                        attempts = attempts,
                        error = %e,
                        "Read failed, giving up"
                    );
                    return Err(RetryError {
                        attempts,
                        last_error: e,
                    });
                }

                let delay = config.calculate_delay(attempt);
                warn!(
                    label = %label,
                    attempt = attempts,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Read failed, will retry"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
