//! # Retry Policy
//!
//! Classifies sub-batch failures as retryable or not. Large backfills run
//! concurrently with live production traffic, so lock contention and
//! statement timeouts are expected and recoverable; anything else must not
//! be silently swallowed.

use crate::config::RetryConfig;
use crate::error::BackfillError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// The decision for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep the backoff interval, then re-run the same boundary.
    Retry,
    /// Surface the error to the caller, aborting the remaining range.
    Propagate,
}

/// Bounded fixed-backoff retry for transient data-store errors.
#[derive(Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    backoffs_observed: AtomicU64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff,
            backoffs_observed: AtomicU64::new(0),
        }
    }

    /// Pure decision function: given the error and the number of attempts
    /// already made, retry or propagate.
    pub fn decide(&self, error: &BackfillError, attempts_made: u32) -> RetryDecision {
        if error.is_transient() && attempts_made < self.max_attempts {
            RetryDecision::Retry
        } else {
            RetryDecision::Propagate
        }
    }

    /// Sleep the fixed backoff interval before re-running a boundary.
    ///
    /// ```
    /// use backfill_core::{RetryConfig, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(&RetryConfig {
    ///     max_attempts: 3,
    ///     backoff: Duration::from_millis(1),
    /// });
    /// tokio_test::block_on(policy.backoff_sleep());
    /// assert_eq!(policy.backoffs_observed(), 1);
    /// ```
    pub async fn backoff_sleep(&self) {
        self.backoffs_observed.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.backoff).await;
    }

    /// How many backoff sleeps this policy has performed.
    pub fn backoffs_observed(&self) -> u64 {
        self.backoffs_observed.load(Ordering::Relaxed)
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
