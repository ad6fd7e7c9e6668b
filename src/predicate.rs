//! # Range Predicates
//!
//! Translates a batch boundary plus its ordered cursor columns into a
//! parameterized SQL condition: `col BETWEEN $1 AND $2` for scalar cursors,
//! and a row-value comparison preserving lexicographic tuple ordering for
//! composite cursors. The rendered text and the ordered bind values are kept
//! separate so statements stay parameterized end to end.

use crate::batching::BatchBoundary;
use crate::cursor::CursorValue;
use crate::error::{BackfillError, Result};

/// A bounded row selector for one sub-batch.
#[derive(Debug, Clone)]
pub struct RangePredicate {
    columns: Vec<String>,
    lower: Vec<CursorValue>,
    upper: Option<Vec<CursorValue>>,
}

/// Double-quote an identifier for direct inclusion in SQL text.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

impl RangePredicate {
    /// Build the predicate for a boundary over the given cursor columns.
    pub fn new(columns: &[String], boundary: &BatchBoundary) -> Result<Self> {
        if columns.is_empty() {
            return Err(BackfillError::configuration(
                "range predicate requires at least one column",
            ));
        }
        if boundary.lower().arity() != columns.len() {
            return Err(BackfillError::configuration(format!(
                "boundary arity {} does not match {} column(s)",
                boundary.lower().arity(),
                columns.len()
            )));
        }
        if let Some(upper) = boundary.upper() {
            if upper.arity() != columns.len() {
                return Err(BackfillError::configuration(format!(
                    "boundary arity {} does not match {} column(s)",
                    upper.arity(),
                    columns.len()
                )));
            }
        }

        Ok(Self {
            columns: columns.to_vec(),
            lower: boundary.lower().values().to_vec(),
            upper: boundary
                .upper()
                .map(|cursor| cursor.values().to_vec()),
        })
    }

    /// Render the condition with positional placeholders starting at
    /// `$first_placeholder`, so callers can prepend their own binds.
    pub fn to_sql(&self, first_placeholder: usize) -> String {
        let mut next = first_placeholder;
        let mut placeholders = |count: usize| -> Vec<String> {
            let rendered = (next..next + count).map(|n| format!("${n}")).collect();
            next += count;
            rendered
        };

        if self.columns.len() == 1 {
            let column = quote_ident(&self.columns[0]);
            return match &self.upper {
                Some(_) => {
                    let binds = placeholders(2);
                    format!("{column} BETWEEN {} AND {}", binds[0], binds[1])
                }
                None => {
                    let binds = placeholders(1);
                    format!("{column} >= {}", binds[0])
                }
            };
        }

        let tuple = format!(
            "({})",
            self.columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let lower_binds = placeholders(self.columns.len()).join(", ");
        match &self.upper {
            Some(_) => {
                let upper_binds = placeholders(self.columns.len()).join(", ");
                format!("{tuple} >= ({lower_binds}) AND {tuple} <= ({upper_binds})")
            }
            None => format!("{tuple} >= ({lower_binds})"),
        }
    }

    /// Bind values in placeholder order: lower components, then upper.
    pub fn bind_values(&self) -> Vec<CursorValue> {
        let mut values = self.lower.clone();
        if let Some(upper) = &self.upper {
            values.extend(upper.iter().cloned());
        }
        values
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_open_ended(&self) -> bool {
        self.upper.is_none()
    }
}
