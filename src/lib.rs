#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Backfill Core
//!
//! Batched, resumable, throttled execution engine for one-off data
//! migrations against live, large-scale relational tables.
//!
//! ## Overview
//!
//! Individual migrations — backfill a column, deduplicate rows, archive old
//! records — are thin, domain-specific statements. This crate is the common
//! harness they all run on: it takes an enormous table, partitions a bounded
//! key range into small sub-batches, applies the migration's unit of work to
//! each with pauses in between to avoid saturating the production database,
//! retries transient timeouts with bounded backoff, and relies on idempotent
//! (insert, do-nothing-on-conflict) write semantics so a crashed or
//! restarted job resumes without re-corrupting data.
//!
//! ## Module Organization
//!
//! - [`cursor`] - Scalar and composite cursor positions with lexicographic order
//! - [`batching`] - Boundary types and the lazy range batchers
//! - [`predicate`] - Parameterized range predicates over cursor columns
//! - [`relation`] - The keyset seam to the data store, with a sqlx/Postgres impl
//! - [`executor`] - Sub-batch execution, retry policy, and throttle
//! - [`metrics`] - Append-only per-run timing recorder
//! - [`job`] - The unit-of-work contract and the run loop
//! - [`config`] - Immutable per-invocation job configuration
//! - [`error`] - Structured error handling with transient classification
//! - [`logging`] - Structured logging initialization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use backfill_core::{
//!     BatchedMigration, JobConfig, MigrationJob, PgBatchRelation, Result, SubBatch,
//! };
//! use std::sync::Arc;
//!
//! struct NullMigration;
//!
//! #[async_trait::async_trait]
//! impl BatchedMigration for NullMigration {
//!     async fn perform_sub_batch(&self, _sub_batch: &SubBatch<'_>) -> Result<u64> {
//!         Ok(0)
//!     }
//! }
//!
//! # async fn example(pool: sqlx::PgPool) -> Result<()> {
//! let config = JobConfig::scalar_range("events", "id", 1, 1_000_000, 500, 100)?;
//! let relation = Arc::new(PgBatchRelation::new(pool, &config));
//! let mut job = MigrationJob::new(config, relation, NullMigration)?;
//! let report = job.perform().await?;
//! println!(
//!     "processed {} sub-batches, {} rows",
//!     report.boundaries_processed, report.rows_affected
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! Sub-batches within one run execute strictly in ascending cursor order and
//! commit independently; atomicity is per sub-batch only. Concurrent runs
//! must be assigned disjoint ranges by the external scheduler.

pub mod batching;
pub mod config;
pub mod cursor;
pub mod error;
pub mod executor;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod predicate;
pub mod relation;

pub use batching::{BatchBoundary, KeysetRangeBatcher, RangeBatcher, ScalarRangeBatcher};
pub use config::{JobConfig, RetryConfig};
pub use cursor::{Cursor, CursorValue};
pub use error::{BackfillError, Result};
pub use executor::{ExecutionOutcome, RetryDecision, RetryPolicy, SubBatchExecutor, Throttle};
pub use job::{BatchedMigration, JobReport, JobRunState, MigrationJob, SubBatch};
pub use metrics::{BatchMetrics, TimingSample};
pub use predicate::RangePredicate;
pub use relation::{BatchRelation, PgBatchRelation};
