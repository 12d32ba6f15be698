// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded retry with exponential backoff.
//!
//! Commit and rollback are the most failure-prone edge of a sync attempt, so
//! the [`Synchronizer`](crate::Synchronizer) wraps both in
//! [`retry_with_backoff`]. Transmission itself is never retried.
//!
//! Intermediate failures are not discarded: a [`RetryError`] carries the
//! message of every failed attempt.
//!
//! # Example
//!
//! ```rust
//! # async fn example() {
//! use collection_sync::resilience::{retry_with_backoff, RetryConfig};
//!
//! let result = retry_with_backoff(&RetryConfig::testing(), "commit", || async {
//!     Ok::<_, String>(true)
//! })
//! .await;
//! assert!(result.is_ok());
//! # }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: usize,

    /// Delay before the second attempt.
    pub initial_delay: Duration,

    /// Maximum delay between attempts (ceiling for exponential backoff).
    pub max_delay: Duration,

    /// Backoff multiplier (e.g., 2.0 = double delay each retry).
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    /// Five attempts, 10ms doubling up to 1s.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Five attempts with no delay, for tests.
    pub fn testing() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Single attempt, no retry.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::testing()
        }
    }

    /// Calculate delay for a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let multiplier = self.backoff_factor.powi((attempt - 1) as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        // f64::min also clamps infinity and NaN to the ceiling
        let capped = delay_secs.min(self.max_delay.as_secs_f64()).max(0.0);

        std::cmp::min(Duration::from_secs_f64(capped), self.max_delay)
    }
}

/// Every attempt of a retried operation failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} failed after {attempts} attempts: {}", .errors.join("; "))]
pub struct RetryError {
    /// Name of the retried operation.
    pub operation: String,
    /// Number of attempts made.
    pub attempts: usize,
    /// Error message of each failed attempt, in order.
    pub errors: Vec<String>,
}

impl RetryError {
    /// Message of the final failed attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.errors.last().map(String::as_str)
    }
}

/// Run `f` until it succeeds or `config.max_attempts` is reached.
///
/// Sleeps `config.delay_for_attempt(n)` between attempt `n` and `n + 1`.
/// A `max_attempts` of 0 is treated as 1.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut f: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut errors = Vec::new();

    for attempt in 1..=max_attempts {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Operation failed"
                );
                crate::metrics::record_retry(operation);
                errors.push(e.to_string());
                if attempt < max_attempts {
                    let delay = config.delay_for_attempt(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    Err(RetryError {
        operation: operation.to_string(),
        attempts: max_attempts,
        errors,
    })
}
