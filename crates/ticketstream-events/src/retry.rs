//! Retry policy for chunk-level failures.
//!
//! A chunk that aborts with a retryable error is re-run after an
//! exponentially growing backoff; after `max_attempts` retries the
//! payload is dead-lettered. Non-retryable classes (structural nulls,
//! validation failures, duplicates) never wait out a backoff: they
//! short-circuit to the dead-letter path on the first failure.

use std::time::Duration;
use ticketstream_core::{BulkConfig, BulkErrorCode};

/// Exponential backoff policy with an interval cap.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first delivery.
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub initial_interval: Duration,
    /// Growth factor per retry.
    pub multiplier: f64,
    /// Upper bound on any backoff.
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(1_000),
            multiplier: 2.0,
            max_interval: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    /// Build the policy from the shared pipeline configuration.
    #[must_use]
    pub fn from_config(cfg: &BulkConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            initial_interval: Duration::from_millis(cfg.initial_interval_ms),
            multiplier: cfg.multiplier,
            max_interval: Duration::from_millis(cfg.max_interval_ms),
        }
    }

    /// Backoff before retry `n` (0-based): `min(max, initial × mult^n)`.
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let scaled = self.initial_interval.as_millis() as f64 * self.multiplier.powi(retry as i32);
        let capped = scaled.min(self.max_interval.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether another retry is allowed after `retries_done` retries.
    #[must_use]
    pub fn allows_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_attempts
    }

    /// Whether this error class ever enters the retry loop.
    #[must_use]
    pub fn is_retryable(&self, code: BulkErrorCode) -> bool {
        code.is_retryable()
    }
}
