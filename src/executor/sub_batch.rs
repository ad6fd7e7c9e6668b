//! # Sub-Batch Executor
//!
//! Translates one boundary into a bounded row selector, hands it to the
//! migration's unit of work, and records the observation. The executor
//! performs no writes itself; all mutations belong to the callback, which
//! must use insert-do-nothing-on-conflict semantics so re-running a
//! boundary after a partial prior success is safe.

use crate::batching::BatchBoundary;
use crate::config::JobConfig;
use crate::error::{BackfillError, Result};
use crate::job::{BatchedMigration, SubBatch};
use crate::metrics::{BatchMetrics, TimingSample};
use crate::predicate::RangePredicate;
use std::time::Instant;
use tracing::{debug, warn};

/// Terminal result of one boundary after the retry policy has run its course.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// First attempt succeeded.
    Completed { rows_affected: u64 },
    /// Succeeded after one or more transient failures.
    RetriedThenCompleted { attempts: u32, rows_affected: u64 },
    /// Fatal error or exhausted retries; aborts the remaining range.
    Failed(BackfillError),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    pub fn rows_affected(&self) -> u64 {
        match self {
            Self::Completed { rows_affected }
            | Self::RetriedThenCompleted { rows_affected, .. } => *rows_affected,
            Self::Failed(_) => 0,
        }
    }

    /// Total attempts the boundary consumed.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { .. } => 1,
            Self::RetriedThenCompleted { attempts, .. } => *attempts,
            Self::Failed(_) => 0,
        }
    }
}

/// Runs unit-of-work attempts for one job run, recording a timing sample
/// per attempt.
pub struct SubBatchExecutor<'a> {
    config: &'a JobConfig,
    metrics: &'a BatchMetrics,
}

impl<'a> SubBatchExecutor<'a> {
    pub fn new(config: &'a JobConfig, metrics: &'a BatchMetrics) -> Self {
        Self { config, metrics }
    }

    /// Build the bounded selector for a boundary using the job's cursor columns.
    pub fn predicate_for(&self, boundary: &BatchBoundary) -> Result<RangePredicate> {
        RangePredicate::new(&self.config.batch_columns, boundary)
    }

    /// Invoke the unit of work once for `boundary` and record the attempt.
    pub async fn attempt<M>(
        &self,
        migration: &M,
        predicate: &RangePredicate,
        boundary: &BatchBoundary,
        attempt: u32,
    ) -> Result<u64>
    where
        M: BatchedMigration + ?Sized,
    {
        let sub_batch = SubBatch::new(self.config, predicate, boundary);
        let started = Instant::now();
        let result = migration.perform_sub_batch(&sub_batch).await;
        let duration = started.elapsed();

        match &result {
            Ok(rows_affected) => {
                debug!(
                    table = %self.config.batch_table,
                    boundary = %boundary,
                    attempt,
                    rows_affected,
                    duration_ms = duration.as_millis() as u64,
                    "Sub-batch attempt succeeded"
                );
                self.metrics.record(TimingSample {
                    predicate: predicate.to_sql(1),
                    duration,
                    rows_affected: *rows_affected,
                    attempt,
                    succeeded: true,
                });
            }
            Err(error) => {
                warn!(
                    table = %self.config.batch_table,
                    boundary = %boundary,
                    attempt,
                    transient = error.is_transient(),
                    duration_ms = duration.as_millis() as u64,
                    error = %error,
                    "Sub-batch attempt failed"
                );
                self.metrics.record(TimingSample {
                    predicate: predicate.to_sql(1),
                    duration,
                    rows_affected: 0,
                    attempt,
                    succeeded: false,
                });
            }
        }

        result
    }
}
