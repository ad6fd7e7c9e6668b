//! # Range Batchers
//!
//! Partition a bounded cursor range `[start, end]` into contiguous,
//! non-overlapping sub-batch boundaries of at most `sub_batch_size` rows,
//! emitted lazily in ascending cursor order. Two strategies:
//!
//! - [`ScalarRangeBatcher`] subdivides integer key ranges arithmetically,
//!   with no data-store round trips.
//! - [`KeysetRangeBatcher`] asks the relation for the Nth key tuple past the
//!   current position, which handles composite keys and non-uniform key
//!   distributions that cannot be subdivided arithmetically.
//!
//! Both are finite and non-restartable: each emitted boundary strictly
//! advances past the previous upper bound, so a sub-batch matching zero rows
//! can never loop.

use crate::batching::BatchBoundary;
use crate::cursor::Cursor;
use crate::error::{BackfillError, Result};
use crate::relation::BatchRelation;
use async_trait::async_trait;
use std::sync::Arc;

/// Lazy producer of sub-batch boundaries for one job run.
#[async_trait]
pub trait RangeBatcher: Send {
    /// The next boundary, or `None` once the end cursor is exhausted.
    async fn next_boundary(&mut self) -> Result<Option<BatchBoundary>>;
}

/// Arithmetic partitioner over a single integer key column.
#[derive(Debug)]
pub struct ScalarRangeBatcher {
    position: Option<i64>,
    end: i64,
    sub_batch_size: u64,
}

impl ScalarRangeBatcher {
    /// `start > end` is legal and yields zero boundaries; a zero
    /// `sub_batch_size` is a configuration error.
    pub fn new(start: i64, end: i64, sub_batch_size: u64) -> Result<Self> {
        if sub_batch_size == 0 {
            return Err(BackfillError::configuration(
                "sub_batch_size must be a positive integer",
            ));
        }
        Ok(Self {
            position: (start <= end).then_some(start),
            end,
            sub_batch_size,
        })
    }

    /// Synchronous advance; the async trait impl delegates here.
    pub fn next(&mut self) -> Result<Option<BatchBoundary>> {
        let Some(lower) = self.position else {
            return Ok(None);
        };

        let span = i64::try_from(self.sub_batch_size - 1).unwrap_or(i64::MAX);
        let upper = lower.saturating_add(span).min(self.end);
        // An overflowing successor means the key space itself is exhausted.
        self.position = upper.checked_add(1).filter(|next| *next <= self.end);

        let boundary = BatchBoundary::closed(Cursor::scalar(lower), Cursor::scalar(upper))?;
        Ok(Some(boundary))
    }
}

#[async_trait]
impl RangeBatcher for ScalarRangeBatcher {
    async fn next_boundary(&mut self) -> Result<Option<BatchBoundary>> {
        self.next()
    }
}

/// Relation-assisted partitioner for composite or non-uniform keys. Each
/// boundary's upper bound is an actual row key fetched in batch-column
/// order, so chunks carry `sub_batch_size` rows regardless of how the keys
/// are distributed.
pub struct KeysetRangeBatcher {
    relation: Arc<dyn BatchRelation>,
    position: Option<Cursor>,
    end: Cursor,
    sub_batch_size: u64,
}

impl KeysetRangeBatcher {
    pub fn new(
        relation: Arc<dyn BatchRelation>,
        start: Cursor,
        end: Cursor,
        sub_batch_size: u64,
    ) -> Result<Self> {
        if sub_batch_size == 0 {
            return Err(BackfillError::configuration(
                "sub_batch_size must be a positive integer",
            ));
        }
        Ok(Self {
            relation,
            position: (start <= end).then_some(start),
            end,
            sub_batch_size,
        })
    }
}

#[async_trait]
impl RangeBatcher for KeysetRangeBatcher {
    async fn next_boundary(&mut self) -> Result<Option<BatchBoundary>> {
        let Some(lower) = self.position.clone() else {
            return Ok(None);
        };
        if lower > self.end {
            self.position = None;
            return Ok(None);
        }

        // No trailing empty boundary once the range holds no more rows.
        let Some(max_in_range) = self.relation.max_cursor_in_range(&lower, &self.end).await?
        else {
            self.position = None;
            return Ok(None);
        };

        match self
            .relation
            .next_cursor_after(&lower, self.sub_batch_size - 1)
            .await?
        {
            Some(upper) if upper >= self.end => {
                self.position = None;
                Ok(Some(BatchBoundary::closed(lower, self.end.clone())?))
            }
            Some(upper) => {
                self.position = self
                    .relation
                    .next_cursor_after(&lower, self.sub_batch_size)
                    .await?;
                Ok(Some(BatchBoundary::closed(lower, upper)?))
            }
            // Fewer rows than a full sub-batch remain; clip to the last real key.
            None => {
                self.position = None;
                Ok(Some(BatchBoundary::closed(lower, max_in_range)?))
            }
        }
    }
}
