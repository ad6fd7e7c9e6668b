//! # Job Configuration
//!
//! Immutable per-invocation configuration for a batched migration run:
//! the table and cursor columns being iterated, the bounded cursor range,
//! sub-batch sizing, throttle pause, retry settings, and the opaque
//! job-specific arguments interpreted by the concrete migration.

use crate::cursor::Cursor;
use crate::error::{BackfillError, Result};
use std::time::Duration;

/// Retry settings for transient data-store errors.
///
/// The attempt bound is configuration rather than a constant: individual
/// migrations in the wild disagree on whether two or three attempts is
/// right, so the scheduler decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts per sub-batch, including the first (so 3 means 2 retries).
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    /// Read overrides from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(max_attempts) = std::env::var("BACKFILL_MAX_ATTEMPTS") {
            config.max_attempts = max_attempts.parse().map_err(|e| {
                BackfillError::configuration(format!("Invalid max_attempts: {e}"))
            })?;
        }

        if let Ok(backoff_ms) = std::env::var("BACKFILL_BACKOFF_MS") {
            let backoff_ms: u64 = backoff_ms.parse().map_err(|e| {
                BackfillError::configuration(format!("Invalid backoff_ms: {e}"))
            })?;
            config.backoff = Duration::from_millis(backoff_ms);
        }

        if config.max_attempts == 0 {
            return Err(BackfillError::configuration(
                "max_attempts must be at least 1",
            ));
        }

        Ok(config)
    }
}

/// Immutable record describing one migration job invocation. Created once
/// by the external scheduler; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Table being iterated.
    pub batch_table: String,
    /// Column(s) defining cursor order, outermost first.
    pub batch_columns: Vec<String>,
    /// Inclusive lower bound of the range.
    pub start_cursor: Cursor,
    /// Inclusive upper bound of the range.
    pub end_cursor: Cursor,
    /// Maximum rows per unit of work.
    pub sub_batch_size: u64,
    /// Throttle pause between sub-batches. Zero means no delay.
    pub pause: Duration,
    /// Job-specific static parameters, opaque to the engine.
    pub job_arguments: serde_json::Value,
    /// Retry settings for transient errors.
    pub retry: RetryConfig,
}

impl JobConfig {
    /// Build and validate a configuration over an arbitrary cursor range.
    ///
    /// Fails fast on non-positive `sub_batch_size`, empty identifiers, or a
    /// cursor arity that does not match the batch columns. A range with
    /// `start_cursor > end_cursor` is legal and yields a no-op run.
    pub fn new(
        batch_table: impl Into<String>,
        batch_columns: Vec<String>,
        start_cursor: Cursor,
        end_cursor: Cursor,
        sub_batch_size: u64,
        pause_ms: u64,
    ) -> Result<Self> {
        let config = Self {
            batch_table: batch_table.into(),
            batch_columns,
            start_cursor,
            end_cursor,
            sub_batch_size,
            pause: Duration::from_millis(pause_ms),
            job_arguments: serde_json::Value::Null,
            retry: RetryConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration for the common case of a single integer key
    /// column bounded by `start_id..=end_id`.
    pub fn scalar_range(
        batch_table: impl Into<String>,
        batch_column: impl Into<String>,
        start_id: i64,
        end_id: i64,
        sub_batch_size: u64,
        pause_ms: u64,
    ) -> Result<Self> {
        Self::new(
            batch_table,
            vec![batch_column.into()],
            Cursor::scalar(start_id),
            Cursor::scalar(end_id),
            sub_batch_size,
            pause_ms,
        )
    }

    /// Attach job-specific static parameters.
    pub fn with_job_arguments(mut self, job_arguments: serde_json::Value) -> Self {
        self.job_arguments = job_arguments;
        self
    }

    /// Override the default retry settings.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.batch_table.trim().is_empty() {
            return Err(BackfillError::configuration("batch_table must be named"));
        }
        if self.batch_columns.is_empty() {
            return Err(BackfillError::configuration(
                "at least one batch_column is required",
            ));
        }
        if self.batch_columns.iter().any(|c| c.trim().is_empty()) {
            return Err(BackfillError::configuration(
                "batch_columns must not contain empty names",
            ));
        }
        if self.sub_batch_size == 0 {
            return Err(BackfillError::configuration(
                "sub_batch_size must be a positive integer",
            ));
        }
        if self.start_cursor.arity() != self.batch_columns.len()
            || self.end_cursor.arity() != self.batch_columns.len()
        {
            return Err(BackfillError::configuration(format!(
                "cursor arity must match batch_columns: {} column(s), start arity {}, end arity {}",
                self.batch_columns.len(),
                self.start_cursor.arity(),
                self.end_cursor.arity()
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(BackfillError::configuration(
                "max_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}
