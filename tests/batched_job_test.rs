//! End-to-end behavior of the batched migration harness over an in-memory
//! data store: partition correctness, idempotence, retry bounds, throttling,
//! metrics accumulation, and mid-range abort semantics.

mod common;

use backfill_core::{
    BackfillError, Cursor, JobConfig, JobRunState, KeysetRangeBatcher, MigrationJob, RangeBatcher,
    RetryConfig,
};
use common::{
    CopyMigration, DeriveValueMigration, FakeRelation, FatalAtKeyMigration, FlakyMigration,
    InMemoryTable,
};
use std::time::Duration;

fn retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        backoff: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn ten_rows_in_sub_batches_of_two_mutates_exactly_the_range() {
    // Rows 0 and 11 sit outside the migrated range.
    let table = InMemoryTable::with_rows((0..=11).map(|k| (k, k)));
    let config = JobConfig::scalar_range("events", "id", 1, 10, 2, 0).unwrap();
    let relation = FakeRelation::new(table.clone());
    let migration = DeriveValueMigration {
        table: table.clone(),
    };
    let mut job = MigrationJob::new(config, relation, migration).unwrap();

    let report = job.perform().await.unwrap();

    assert_eq!(report.boundaries_processed, 5);
    assert_eq!(report.rows_affected, 10);
    for key in 1..=10 {
        assert_eq!(table.value(key), Some(key * 10), "row {key} in range");
    }
    assert_eq!(table.value(0), Some(0), "row below range untouched");
    assert_eq!(table.value(11), Some(11), "row above range untouched");
}

#[tokio::test]
async fn performing_twice_produces_the_same_final_row_set() {
    let source = InMemoryTable::with_sequential_keys(10);
    let destination = InMemoryTable::with_rows([]);
    let config = JobConfig::scalar_range("events", "id", 1, 10, 3, 0).unwrap();
    let relation = FakeRelation::new(source.clone());
    let migration = CopyMigration {
        source: source.clone(),
        destination: destination.clone(),
    };
    let mut job = MigrationJob::new(config, relation, migration).unwrap();

    let first = job.perform().await.unwrap();
    let after_first = destination.rows();
    let second = job.perform().await.unwrap();

    assert_eq!(first.rows_affected, 10);
    // Conflict-skipping inserts mean the rerun changes nothing.
    assert_eq!(second.rows_affected, 0);
    assert_eq!(destination.rows(), after_first);
    assert_eq!(destination.len(), 10);
}

#[tokio::test]
async fn rerunning_a_derivation_does_not_double_transform() {
    let table = InMemoryTable::with_sequential_keys(6);
    let config = JobConfig::scalar_range("events", "id", 1, 6, 2, 0).unwrap();
    let migration = DeriveValueMigration {
        table: table.clone(),
    };
    let mut job = MigrationJob::new(config, FakeRelation::new(table.clone()), migration).unwrap();

    job.perform().await.unwrap();
    let once = table.rows();
    job.perform().await.unwrap();

    assert_eq!(table.rows(), once);
}

#[tokio::test]
async fn transient_failures_within_the_bound_are_retried_to_success() {
    let table = InMemoryTable::with_sequential_keys(10);
    let config = JobConfig::scalar_range("events", "id", 1, 10, 2, 0)
        .unwrap()
        .with_retry(retry(3));
    let migration = FlakyMigration::failing_times(
        DeriveValueMigration {
            table: table.clone(),
        },
        2,
    );
    let mut job = MigrationJob::new(config, FakeRelation::new(table.clone()), migration).unwrap();

    let report = job.perform().await.unwrap();

    assert_eq!(report.boundaries_processed, 5);
    let first_sample = job.metrics().timings().first().cloned().unwrap();
    assert!(!first_sample.succeeded);
    // The backoff slept once per transient failure, no more.
    assert_eq!(job.metrics().failed_attempts(), 2);
    assert_eq!(job.retry_policy().backoffs_observed(), 2);
    assert_eq!(table.value(1), Some(10));
}

#[tokio::test]
async fn exhausting_the_retry_bound_raises_the_transient_error() {
    let table = InMemoryTable::with_sequential_keys(10);
    let config = JobConfig::scalar_range("events", "id", 1, 10, 2, 0)
        .unwrap()
        .with_retry(retry(3));
    let migration = FlakyMigration::failing_times(
        DeriveValueMigration {
            table: table.clone(),
        },
        3,
    );
    let mut job = MigrationJob::new(config, FakeRelation::new(table.clone()), migration).unwrap();

    let result = job.perform().await;

    assert!(matches!(
        result,
        Err(BackfillError::StatementTimeout { .. })
    ));
    assert_eq!(job.state(), JobRunState::Failed);
    assert_eq!(job.metrics().failed_attempts(), 3);
    // Three attempts admit only two backoffs; the third failure propagates.
    assert_eq!(job.retry_policy().backoffs_observed(), 2);
    // No boundary completed, so no row was transformed.
    assert_eq!(table.value(1), Some(1));
}

#[tokio::test]
async fn attempt_bound_is_taken_from_configuration() {
    let table = InMemoryTable::with_sequential_keys(4);
    let config = JobConfig::scalar_range("events", "id", 1, 4, 2, 0)
        .unwrap()
        .with_retry(retry(5));
    let migration = FlakyMigration::failing_times(
        DeriveValueMigration {
            table: table.clone(),
        },
        4,
    );
    let mut job = MigrationJob::new(config, FakeRelation::new(table.clone()), migration).unwrap();

    let report = job.perform().await.unwrap();

    assert_eq!(report.boundaries_processed, 2);
    assert_eq!(job.metrics().failed_attempts(), 4);
    assert_eq!(job.retry_policy().backoffs_observed(), 4);
}

#[tokio::test]
async fn throttle_pauses_once_after_each_completed_sub_batch() {
    let table = InMemoryTable::with_sequential_keys(10);
    let config = JobConfig::scalar_range("events", "id", 1, 10, 2, 1).unwrap();
    let migration = DeriveValueMigration {
        table: table.clone(),
    };
    let mut job = MigrationJob::new(config, FakeRelation::new(table), migration).unwrap();

    job.perform().await.unwrap();

    assert_eq!(job.throttle().pauses_observed(), 5);
}

#[tokio::test]
async fn zero_pause_runs_observe_no_throttle_sleeps() {
    let table = InMemoryTable::with_sequential_keys(10);
    let config = JobConfig::scalar_range("events", "id", 1, 10, 2, 0).unwrap();
    let migration = DeriveValueMigration {
        table: table.clone(),
    };
    let mut job = MigrationJob::new(config, FakeRelation::new(table), migration).unwrap();

    job.perform().await.unwrap();

    assert_eq!(job.throttle().pauses_observed(), 0);
}

#[tokio::test]
async fn timings_start_empty_and_accumulate() {
    let table = InMemoryTable::with_sequential_keys(3);
    let config = JobConfig::scalar_range("events", "id", 1, 3, 2, 0).unwrap();
    let migration = DeriveValueMigration {
        table: table.clone(),
    };
    let mut job = MigrationJob::new(config, FakeRelation::new(table), migration).unwrap();

    assert!(job.metrics().is_empty());

    job.perform().await.unwrap();

    let timings = job.metrics().timings();
    assert_eq!(timings.len(), 2);
    assert!(timings
        .iter()
        .all(|t| t.predicate == r#""id" BETWEEN $1 AND $2"#));
    assert_eq!(job.metrics().rows_affected_total(), 3);
}

#[tokio::test]
async fn fatal_error_mid_range_keeps_the_committed_prefix() {
    let table = InMemoryTable::with_sequential_keys(10);
    let config = JobConfig::scalar_range("events", "id", 1, 10, 2, 0).unwrap();
    let migration = FatalAtKeyMigration {
        inner: DeriveValueMigration {
            table: table.clone(),
        },
        fatal_key: 6,
    };
    let mut job = MigrationJob::new(config, FakeRelation::new(table.clone()), migration).unwrap();

    let result = job.perform().await;

    assert!(matches!(
        result,
        Err(BackfillError::UnexpectedConflict { .. })
    ));
    // Sub-batches (1,2) and (3,4) committed independently and stay applied.
    for key in 1..=4 {
        assert_eq!(table.value(key), Some(key * 10));
    }
    // The failed sub-batch and everything after it were never applied.
    for key in 5..=10 {
        assert_eq!(table.value(key), Some(key));
    }
}

#[tokio::test]
async fn sparse_keys_under_arithmetic_batching_still_cover_all_rows() {
    let table = InMemoryTable::with_rows([(1, 1), (2, 2), (900, 900), (1000, 1000)]);
    let config = JobConfig::scalar_range("events", "id", 1, 1000, 100, 0).unwrap();
    let migration = DeriveValueMigration {
        table: table.clone(),
    };
    let mut job = MigrationJob::new(config, FakeRelation::new(table.clone()), migration).unwrap();

    let report = job.perform().await.unwrap();

    assert_eq!(report.boundaries_processed, 10);
    assert_eq!(report.rows_affected, 4);
    assert_eq!(table.value(900), Some(9000));
}

#[tokio::test]
async fn keyset_batcher_tracks_actual_row_distribution() {
    let table = InMemoryTable::with_rows([1, 2, 3, 50, 51, 900].map(|k| (k, k)));
    let relation = FakeRelation::new(table);
    let mut batcher =
        KeysetRangeBatcher::new(relation, Cursor::scalar(1), Cursor::scalar(900), 2).unwrap();

    let mut bounds = Vec::new();
    while let Some(boundary) = batcher.next_boundary().await.unwrap() {
        bounds.push((
            boundary.lower().as_scalar_int().unwrap(),
            boundary.upper().unwrap().as_scalar_int().unwrap(),
        ));
    }

    assert_eq!(bounds, vec![(1, 2), (3, 50), (51, 900)]);
}
