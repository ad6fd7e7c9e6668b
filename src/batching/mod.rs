//! # Batching
//!
//! Boundary types and the range batchers that partition a bounded cursor
//! range into contiguous sub-batches.

mod boundary;
mod range_batcher;

pub use boundary::BatchBoundary;
pub use range_batcher::{KeysetRangeBatcher, RangeBatcher, ScalarRangeBatcher};
