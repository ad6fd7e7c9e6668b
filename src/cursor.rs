//! # Cursors
//!
//! A cursor is a position in a table's iteration order: either a single
//! scalar (an integer primary key) or a fixed-arity tuple of comparable
//! values for composite keys such as `[upstream_id, relative_path, status]`.
//! Cursors compare lexicographically component-wise, matching the table's
//! effective index order.

use crate::error::{BackfillError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One component of a cursor tuple.
///
/// Real composite keys keep a consistent type per position; the cross-variant
/// ordering (`Int` before `Text`) exists only to keep the order total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorValue {
    Int(i64),
    Text(String),
}

impl CursorValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl Ord for CursorValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Int(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for CursorValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CursorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "'{value}'"),
        }
    }
}

impl From<i64> for CursorValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for CursorValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CursorValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// An ordered, fixed-arity tuple of comparable values identifying a row
/// position. Constructed once per job as `start_cursor`/`end_cursor` and
/// immutable thereafter; the batcher derives interior cursors as it advances.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cursor(Vec<CursorValue>);

impl Cursor {
    /// Build a composite cursor. At least one component is required.
    pub fn new(values: Vec<CursorValue>) -> Result<Self> {
        if values.is_empty() {
            return Err(BackfillError::configuration(
                "cursor requires at least one component",
            ));
        }
        Ok(Self(values))
    }

    /// Build a single-column integer cursor (the common `start_id`/`end_id` case).
    pub fn scalar(id: i64) -> Self {
        Self(vec![CursorValue::Int(id)])
    }

    pub fn values(&self) -> &[CursorValue] {
        &self.0
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.0.len() == 1
    }

    /// The integer value of a single-column integer cursor, if that is what this is.
    pub fn as_scalar_int(&self) -> Option<i64> {
        match self.0.as_slice() {
            [CursorValue::Int(value)] => Some(*value),
            _ => None,
        }
    }

    /// The next scalar position after this cursor, for arithmetic batch
    /// advancement. `None` for composite or non-integer cursors, and at the
    /// upper end of the key space.
    pub fn successor(&self) -> Option<Self> {
        self.as_scalar_int()
            .and_then(|id| id.checked_add(1))
            .map(Self::scalar)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.as_scalar_int() {
            return write!(f, "{id}");
        }
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

impl From<i64> for Cursor {
    fn from(id: i64) -> Self {
        Self::scalar(id)
    }
}
