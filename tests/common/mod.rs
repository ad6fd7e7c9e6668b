#![allow(dead_code)]

//! Shared test support: an in-memory table standing in for the data store,
//! a relation over its key set, and instrumented migrations.

use async_trait::async_trait;
use backfill_core::{
    BackfillError, BatchRelation, BatchedMigration, Cursor, Result, SubBatch,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory table keyed by a scalar integer id.
#[derive(Debug, Default)]
pub struct InMemoryTable {
    rows: Mutex<BTreeMap<i64, i64>>,
}

impl InMemoryTable {
    pub fn with_rows(rows: impl IntoIterator<Item = (i64, i64)>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows.into_iter().collect()),
        })
    }

    /// Keys 1..=n, each with value equal to its key.
    pub fn with_sequential_keys(n: i64) -> Arc<Self> {
        Self::with_rows((1..=n).map(|k| (k, k)))
    }

    pub fn value(&self, key: i64) -> Option<i64> {
        self.rows.lock().get(&key).copied()
    }

    pub fn rows(&self) -> BTreeMap<i64, i64> {
        self.rows.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// Apply `f` to every value whose key lies inside the sub-batch's
    /// boundary; returns the affected count.
    pub fn update_in_boundary(&self, sub_batch: &SubBatch<'_>, f: impl Fn(i64, i64) -> i64) -> u64 {
        let mut rows = self.rows.lock();
        let mut affected = 0;
        for (key, value) in rows.iter_mut() {
            if sub_batch.boundary().contains(&Cursor::scalar(*key)) {
                *value = f(*key, *value);
                affected += 1;
            }
        }
        affected
    }

    /// Insert with do-nothing-on-conflict semantics. Returns rows inserted.
    pub fn upsert_from(&self, source: &InMemoryTable, sub_batch: &SubBatch<'_>) -> u64 {
        let source_rows = source.rows.lock();
        let mut rows = self.rows.lock();
        let mut inserted = 0;
        for (key, value) in source_rows.iter() {
            if sub_batch.boundary().contains(&Cursor::scalar(*key)) && !rows.contains_key(key) {
                rows.insert(*key, *value);
                inserted += 1;
            }
        }
        inserted
    }
}

/// [`BatchRelation`] over the in-memory table's key set.
pub struct FakeRelation {
    table: Arc<InMemoryTable>,
}

impl FakeRelation {
    pub fn new(table: Arc<InMemoryTable>) -> Arc<Self> {
        Arc::new(Self { table })
    }
}

#[async_trait]
impl BatchRelation for FakeRelation {
    async fn next_cursor_after(&self, position: &Cursor, offset: u64) -> Result<Option<Cursor>> {
        let rows = self.table.rows();
        Ok(rows
            .keys()
            .filter(|key| Cursor::scalar(**key) >= *position)
            .nth(offset as usize)
            .map(|key| Cursor::scalar(*key)))
    }

    async fn max_cursor_in_range(&self, lower: &Cursor, upper: &Cursor) -> Result<Option<Cursor>> {
        let rows = self.table.rows();
        Ok(rows
            .keys()
            .map(|key| Cursor::scalar(*key))
            .filter(|cursor| cursor >= lower && cursor <= upper)
            .max())
    }
}

/// Sets every in-range value to `key * 10`. Idempotent by construction.
pub struct DeriveValueMigration {
    pub table: Arc<InMemoryTable>,
}

#[async_trait]
impl BatchedMigration for DeriveValueMigration {
    async fn perform_sub_batch(&self, sub_batch: &SubBatch<'_>) -> Result<u64> {
        Ok(self.table.update_in_boundary(sub_batch, |key, _| key * 10))
    }
}

/// Copies in-range rows into a destination table with
/// insert-do-nothing-on-conflict semantics.
pub struct CopyMigration {
    pub source: Arc<InMemoryTable>,
    pub destination: Arc<InMemoryTable>,
}

#[async_trait]
impl BatchedMigration for CopyMigration {
    async fn perform_sub_batch(&self, sub_batch: &SubBatch<'_>) -> Result<u64> {
        Ok(self.destination.upsert_from(&self.source, sub_batch))
    }
}

/// Raises a transient statement timeout a fixed number of times before
/// delegating to an inner migration.
pub struct FlakyMigration<M: BatchedMigration> {
    pub inner: M,
    failures_remaining: Mutex<u32>,
    pub transient_failures_seen: Mutex<u32>,
}

impl<M: BatchedMigration> FlakyMigration<M> {
    pub fn failing_times(inner: M, failures: u32) -> Self {
        Self {
            inner,
            failures_remaining: Mutex::new(failures),
            transient_failures_seen: Mutex::new(0),
        }
    }
}

#[async_trait]
impl<M: BatchedMigration> BatchedMigration for FlakyMigration<M> {
    async fn perform_sub_batch(&self, sub_batch: &SubBatch<'_>) -> Result<u64> {
        {
            let mut remaining = self.failures_remaining.lock();
            if *remaining > 0 {
                *remaining -= 1;
                *self.transient_failures_seen.lock() += 1;
                return Err(BackfillError::StatementTimeout {
                    message: "canceling statement due to statement timeout".to_string(),
                });
            }
        }
        self.inner.perform_sub_batch(sub_batch).await
    }
}

/// Delegates to an inner migration but raises a fatal error for the
/// sub-batch containing `fatal_key`.
pub struct FatalAtKeyMigration<M: BatchedMigration> {
    pub inner: M,
    pub fatal_key: i64,
}

#[async_trait]
impl<M: BatchedMigration> BatchedMigration for FatalAtKeyMigration<M> {
    async fn perform_sub_batch(&self, sub_batch: &SubBatch<'_>) -> Result<u64> {
        if sub_batch.boundary().contains(&Cursor::scalar(self.fatal_key)) {
            return Err(BackfillError::UnexpectedConflict {
                table: sub_batch.table().to_string(),
                key: format!("({})", self.fatal_key),
                message: "duplicate key value violates unique constraint".to_string(),
            });
        }
        self.inner.perform_sub_batch(sub_batch).await
    }
}
