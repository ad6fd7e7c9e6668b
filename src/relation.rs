//! # Batch Relation
//!
//! The engine's entire view of the underlying data store: ordered keyset
//! lookups over the batch columns. Everything else (the actual row
//! mutations) belongs to the unit-of-work callbacks, which receive a bounded
//! predicate and bring their own statements.
//!
//! `PgBatchRelation` is the production implementation over a sqlx Postgres
//! pool; tests substitute an in-memory key set.

use crate::batching::BatchBoundary;
use crate::config::JobConfig;
use crate::cursor::{Cursor, CursorValue};
use crate::error::{BackfillError, Result};
use crate::predicate::{quote_ident, RangePredicate};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Ordered keyset access over the batch columns of one table.
#[async_trait]
pub trait BatchRelation: Send + Sync {
    /// The key tuple of the row `offset` rows past the first row at or after
    /// `position`, in batch-column order. `None` when fewer rows remain.
    async fn next_cursor_after(&self, position: &Cursor, offset: u64) -> Result<Option<Cursor>>;

    /// The greatest key tuple within `[lower, upper]`, or `None` when the
    /// interval holds no rows.
    async fn max_cursor_in_range(&self, lower: &Cursor, upper: &Cursor) -> Result<Option<Cursor>>;
}

/// sqlx/Postgres-backed [`BatchRelation`]. Queries are assembled at runtime
/// with positional binds; identifiers come from the job configuration and
/// are double-quoted.
#[derive(Debug, Clone)]
pub struct PgBatchRelation {
    pool: PgPool,
    table: String,
    columns: Vec<String>,
}

impl PgBatchRelation {
    pub fn new(pool: PgPool, config: &JobConfig) -> Self {
        Self {
            pool,
            table: config.batch_table.clone(),
            columns: config.batch_columns.clone(),
        }
    }

    fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn order_by(&self, descending: bool) -> String {
        let direction = if descending { "DESC" } else { "ASC" };
        self.columns
            .iter()
            .map(|c| format!("{} {direction}", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn decode_cursor(&self, row: &PgRow) -> Result<Cursor> {
        let mut values = Vec::with_capacity(self.columns.len());
        for (index, column) in self.columns.iter().enumerate() {
            let value = match row.try_get::<i64, _>(index) {
                Ok(int) => CursorValue::Int(int),
                Err(_) => match row.try_get::<i32, _>(index) {
                    Ok(int) => CursorValue::Int(i64::from(int)),
                    Err(_) => row
                        .try_get::<String, _>(index)
                        .map(CursorValue::Text)
                        .map_err(|e| {
                            BackfillError::Database {
                                message: format!(
                                    "cursor column {column} is neither integer nor text: {e}"
                                ),
                            }
                        })?,
                },
            };
            values.push(value);
        }
        Cursor::new(values)
    }

    async fn fetch_cursor(&self, sql: &str, binds: Vec<CursorValue>) -> Result<Option<Cursor>> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = match value {
                CursorValue::Int(int) => query.bind(int),
                CursorValue::Text(text) => query.bind(text),
            };
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.map(|row| self.decode_cursor(&row)).transpose()
    }
}

#[async_trait]
impl BatchRelation for PgBatchRelation {
    async fn next_cursor_after(&self, position: &Cursor, offset: u64) -> Result<Option<Cursor>> {
        let boundary = BatchBoundary::new(position.clone(), None)?;
        let predicate = RangePredicate::new(&self.columns, &boundary)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT 1 OFFSET {}",
            self.select_list(),
            quote_ident(&self.table),
            predicate.to_sql(1),
            self.order_by(false),
            offset
        );
        self.fetch_cursor(&sql, predicate.bind_values()).await
    }

    async fn max_cursor_in_range(&self, lower: &Cursor, upper: &Cursor) -> Result<Option<Cursor>> {
        if lower > upper {
            return Ok(None);
        }
        let boundary = BatchBoundary::closed(lower.clone(), upper.clone())?;
        let predicate = RangePredicate::new(&self.columns, &boundary)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT 1",
            self.select_list(),
            quote_ident(&self.table),
            predicate.to_sql(1),
            self.order_by(true),
        );
        self.fetch_cursor(&sql, predicate.bind_values()).await
    }
}
