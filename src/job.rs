//! # Migration Job
//!
//! The pluggable unit-of-work contract and the runner that drives the
//! Range Batcher → Sub-Batch Executor → Retry Policy → Throttle loop over a
//! bounded cursor range.
//!
//! One job run processes sub-batches strictly sequentially; the only
//! suspension points are the throttle pause and the retry backoff. Every
//! sub-batch commits independently, so a crash after N sub-batches leaves
//! the first N durably applied and a corrected re-run resumes safely —
//! provided the unit of work keeps its insert-do-nothing-on-conflict
//! contract.

use crate::batching::{BatchBoundary, KeysetRangeBatcher, RangeBatcher, ScalarRangeBatcher};
use crate::config::JobConfig;
use crate::cursor::CursorValue;
use crate::error::Result;
use crate::executor::{ExecutionOutcome, RetryDecision, RetryPolicy, SubBatchExecutor, Throttle};
use crate::metrics::BatchMetrics;
use crate::predicate::RangePredicate;
use crate::relation::BatchRelation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The bounded row selector handed to a unit of work for one sub-batch.
///
/// Carries everything a concrete migration needs to scope its statement
/// strictly to the boundary: the rendered range condition, its bind values,
/// and the job's static arguments.
pub struct SubBatch<'a> {
    config: &'a JobConfig,
    predicate: &'a RangePredicate,
    boundary: &'a BatchBoundary,
}

impl<'a> SubBatch<'a> {
    pub(crate) fn new(
        config: &'a JobConfig,
        predicate: &'a RangePredicate,
        boundary: &'a BatchBoundary,
    ) -> Self {
        Self {
            config,
            predicate,
            boundary,
        }
    }

    /// Table being iterated.
    pub fn table(&self) -> &str {
        &self.config.batch_table
    }

    /// Cursor columns, outermost first.
    pub fn batch_columns(&self) -> &[String] {
        &self.config.batch_columns
    }

    /// The range condition with placeholders starting at `$first_placeholder`.
    pub fn where_clause(&self, first_placeholder: usize) -> String {
        self.predicate.to_sql(first_placeholder)
    }

    /// Bind values matching [`Self::where_clause`] placeholder order.
    pub fn bind_values(&self) -> Vec<CursorValue> {
        self.predicate.bind_values()
    }

    pub fn predicate(&self) -> &RangePredicate {
        self.predicate
    }

    pub fn boundary(&self) -> &BatchBoundary {
        self.boundary
    }

    /// Job-specific static parameters, opaque to the engine.
    pub fn job_arguments(&self) -> &serde_json::Value {
        &self.config.job_arguments
    }
}

/// The pluggable per-migration unit of work.
///
/// A concrete job implements one bounded mutation — update, copy, delete —
/// scoped strictly to the sub-batch's predicate, and returns the count of
/// rows it affected. Writes must be idempotent (insert, do nothing on
/// conflict) so that re-running a boundary after a partial prior success
/// neither duplicates data nor errors on already-migrated rows. Required
/// static arguments are validated at construction, never mid-run.
#[async_trait]
pub trait BatchedMigration: Send + Sync {
    async fn perform_sub_batch(&self, sub_batch: &SubBatch<'_>) -> Result<u64>;
}

/// Lifecycle of one job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunState {
    /// Sole initial state.
    Idle,
    /// Asking the range batcher for the next boundary.
    Batching,
    /// A unit-of-work attempt is in flight.
    Executing,
    /// Backing off after a transient failure.
    Retrying,
    /// Pausing after a completed sub-batch.
    Throttling,
    /// Every boundary in range completed. Terminal.
    Completed,
    /// Fatal error or exhausted retries. Terminal.
    Failed,
}

impl JobRunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the run loop may move from this state to `next`.
    pub fn can_transition_to(&self, next: JobRunState) -> bool {
        use JobRunState::*;
        match self {
            Idle => matches!(next, Batching),
            Batching => matches!(next, Executing | Completed | Failed),
            Executing => matches!(next, Retrying | Throttling | Failed),
            Retrying => matches!(next, Executing | Failed),
            Throttling => matches!(next, Batching),
            Completed | Failed => false,
        }
    }
}

impl fmt::Display for JobRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Batching => write!(f, "batching"),
            Self::Executing => write!(f, "executing"),
            Self::Retrying => write!(f, "retrying"),
            Self::Throttling => write!(f, "throttling"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub boundaries_processed: u64,
    pub rows_affected: u64,
}

/// Drives one migration over its bounded cursor range.
pub struct MigrationJob<M: BatchedMigration> {
    config: JobConfig,
    relation: Arc<dyn BatchRelation>,
    migration: M,
    retry: RetryPolicy,
    throttle: Throttle,
    metrics: BatchMetrics,
    state: JobRunState,
}

impl<M: BatchedMigration> MigrationJob<M> {
    /// Build a job; configuration problems fail here, never mid-run.
    pub fn new(config: JobConfig, relation: Arc<dyn BatchRelation>, migration: M) -> Result<Self> {
        config.validate()?;
        let retry = RetryPolicy::new(&config.retry);
        let throttle = Throttle::new(config.pause);
        Ok(Self {
            config,
            relation,
            migration,
            retry,
            throttle,
            metrics: BatchMetrics::new(),
            state: JobRunState::Idle,
        })
    }

    /// Run the job over its whole range.
    ///
    /// Returns a summary on success; surfaces the originating error on
    /// unrecoverable failure, leaving already-committed sub-batches applied.
    /// Re-invoking over the same range is effect-idempotent given the unit
    /// of work's conflict semantics.
    pub async fn perform(&mut self) -> Result<JobReport> {
        info!(
            table = %self.config.batch_table,
            start_cursor = %self.config.start_cursor,
            end_cursor = %self.config.end_cursor,
            sub_batch_size = self.config.sub_batch_size,
            pause_ms = self.config.pause.as_millis() as u64,
            "Starting batched migration run"
        );

        // A fresh traversal; prior completions are safe to repeat by contract.
        self.state = JobRunState::Idle;
        let mut batcher = self.build_batcher()?;
        Self::transition(&mut self.state, JobRunState::Batching);

        let executor = SubBatchExecutor::new(&self.config, &self.metrics);
        let mut boundaries_processed = 0u64;
        let mut rows_affected = 0u64;

        loop {
            let boundary = match batcher.next_boundary().await {
                Ok(Some(boundary)) => boundary,
                Ok(None) => break,
                Err(e) => {
                    Self::transition(&mut self.state, JobRunState::Failed);
                    error!(error = %e, "Range batcher failed; aborting run");
                    return Err(e);
                }
            };

            let predicate = match executor.predicate_for(&boundary) {
                Ok(predicate) => predicate,
                Err(e) => {
                    Self::transition(&mut self.state, JobRunState::Failed);
                    return Err(e);
                }
            };

            let mut attempts = 0u32;
            let outcome = loop {
                attempts += 1;
                Self::transition(&mut self.state, JobRunState::Executing);
                match executor
                    .attempt(&self.migration, &predicate, &boundary, attempts)
                    .await
                {
                    Ok(rows) if attempts == 1 => {
                        break ExecutionOutcome::Completed {
                            rows_affected: rows,
                        }
                    }
                    Ok(rows) => {
                        break ExecutionOutcome::RetriedThenCompleted {
                            attempts,
                            rows_affected: rows,
                        }
                    }
                    Err(err) => match self.retry.decide(&err, attempts) {
                        RetryDecision::Retry => {
                            Self::transition(&mut self.state, JobRunState::Retrying);
                            warn!(
                                boundary = %boundary,
                                attempts,
                                backoff_ms = self.retry.backoff().as_millis() as u64,
                                "Transient error; backing off before retry"
                            );
                            self.retry.backoff_sleep().await;
                        }
                        RetryDecision::Propagate => break ExecutionOutcome::Failed(err),
                    },
                }
            };

            match outcome {
                ExecutionOutcome::Failed(err) => {
                    Self::transition(&mut self.state, JobRunState::Failed);
                    error!(
                        boundary = %boundary,
                        attempts,
                        error = %err,
                        "Sub-batch failed; aborting remaining range"
                    );
                    return Err(err);
                }
                outcome => {
                    rows_affected += outcome.rows_affected();
                    boundaries_processed += 1;
                    // Pause after every completed sub-batch, before asking the
                    // batcher for the next boundary. A trailing pause after the
                    // final sub-batch is tolerated.
                    Self::transition(&mut self.state, JobRunState::Throttling);
                    self.throttle.pause().await;
                    Self::transition(&mut self.state, JobRunState::Batching);
                }
            }
        }

        Self::transition(&mut self.state, JobRunState::Completed);
        info!(
            table = %self.config.batch_table,
            boundaries_processed,
            rows_affected,
            "Batched migration run completed"
        );
        Ok(JobReport {
            boundaries_processed,
            rows_affected,
        })
    }

    /// Scalar integer ranges subdivide arithmetically with no round trips;
    /// everything else walks the relation's keyset.
    fn build_batcher(&self) -> Result<Box<dyn RangeBatcher>> {
        let start = &self.config.start_cursor;
        let end = &self.config.end_cursor;
        match (start.as_scalar_int(), end.as_scalar_int()) {
            (Some(start_id), Some(end_id)) if self.config.batch_columns.len() == 1 => Ok(
                Box::new(ScalarRangeBatcher::new(
                    start_id,
                    end_id,
                    self.config.sub_batch_size,
                )?),
            ),
            _ => Ok(Box::new(KeysetRangeBatcher::new(
                Arc::clone(&self.relation),
                start.clone(),
                end.clone(),
                self.config.sub_batch_size,
            )?)),
        }
    }

    fn transition(state: &mut JobRunState, next: JobRunState) {
        debug_assert!(
            state.can_transition_to(next),
            "illegal job state transition {state} -> {next}"
        );
        debug!(from = %state, to = %next, "Job state transition");
        *state = next;
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn metrics(&self) -> &BatchMetrics {
        &self.metrics
    }

    pub fn state(&self) -> JobRunState {
        self.state
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}
