//! Sub-batch boundary pairs emitted by the range batchers.

use crate::cursor::Cursor;
use crate::error::{BackfillError, Result};
use std::fmt;

/// One contiguous cursor interval `[lower, upper]`. An absent upper bound
/// denotes an open-ended selector (everything at or past `lower`), used by
/// keyset probes; the batchers themselves always emit closed boundaries
/// clipped to the job's end cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchBoundary {
    lower: Cursor,
    upper: Option<Cursor>,
}

impl BatchBoundary {
    pub fn new(lower: Cursor, upper: Option<Cursor>) -> Result<Self> {
        if let Some(upper) = &upper {
            if lower > *upper {
                return Err(BackfillError::configuration(format!(
                    "boundary lower bound {lower} exceeds upper bound {upper}"
                )));
            }
            if lower.arity() != upper.arity() {
                return Err(BackfillError::configuration(format!(
                    "boundary bounds disagree on arity: {} vs {}",
                    lower.arity(),
                    upper.arity()
                )));
            }
        }
        Ok(Self { lower, upper })
    }

    /// A closed interval. Panics never; invalid bounds surface as errors.
    pub fn closed(lower: Cursor, upper: Cursor) -> Result<Self> {
        Self::new(lower, Some(upper))
    }

    pub fn lower(&self) -> &Cursor {
        &self.lower
    }

    pub fn upper(&self) -> Option<&Cursor> {
        self.upper.as_ref()
    }

    pub fn is_open_ended(&self) -> bool {
        self.upper.is_none()
    }

    /// Whether a cursor position falls inside this boundary.
    pub fn contains(&self, cursor: &Cursor) -> bool {
        if *cursor < self.lower {
            return false;
        }
        match &self.upper {
            Some(upper) => cursor <= upper,
            None => true,
        }
    }
}

impl fmt::Display for BatchBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.upper {
            Some(upper) => write!(f, "[{}, {}]", self.lower, upper),
            None => write!(f, "[{}, ..)", self.lower),
        }
    }
}
