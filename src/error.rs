//! # Error Types
//!
//! Structured error handling for the batch migration engine using thiserror,
//! with an explicit transient/fatal classification used by the retry policy.

use thiserror::Error;

/// Errors raised by the migration engine or by unit-of-work callbacks.
#[derive(Error, Debug)]
pub enum BackfillError {
    /// Invalid configuration detected at construction or first use. Never retried.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The data store canceled a statement because it exceeded its statement timeout.
    #[error("Statement timed out: {message}")]
    StatementTimeout { message: String },

    /// The data store canceled a query, typically due to lock contention.
    #[error("Query canceled: {message}")]
    QueryCanceled { message: String },

    /// Any other data-store failure. Treated as fatal.
    #[error("Database error: {message}")]
    Database { message: String },

    /// A duplicate-key conflict that does not match the expected
    /// "already migrated" shape. Carries enough context for manual remediation.
    #[error("Unexpected key conflict on {table} for key {key}: {message}")]
    UnexpectedConflict {
        table: String,
        key: String,
        message: String,
    },

    /// A unit-of-work failure that is not a data-store error.
    #[error("Job failed: {message}")]
    JobFailed { message: String },
}

impl BackfillError {
    /// Shorthand for configuration failures.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for opaque unit-of-work failures.
    pub fn job_failed(message: impl Into<String>) -> Self {
        Self::JobFailed {
            message: message.into(),
        }
    }

    /// Whether the retry policy may re-attempt the sub-batch that raised this error.
    ///
    /// Statement timeouts and query cancellations are expected under live
    /// production load and are recoverable; everything else propagates
    /// immediately so logic errors are never silently swallowed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StatementTimeout { .. } | Self::QueryCanceled { .. }
        )
    }
}

// SQLSTATE 57014 is raised for statements canceled by statement_timeout,
// 55P03 when lock_timeout expires while waiting on a contended row.
const SQLSTATE_QUERY_CANCELED: &str = "57014";
const SQLSTATE_LOCK_NOT_AVAILABLE: &str = "55P03";

impl From<sqlx::Error> for BackfillError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) => match db_error.code().as_deref() {
                Some(SQLSTATE_QUERY_CANCELED) => Self::StatementTimeout {
                    message: db_error.to_string(),
                },
                Some(SQLSTATE_LOCK_NOT_AVAILABLE) => Self::QueryCanceled {
                    message: db_error.to_string(),
                },
                _ => Self::Database {
                    message: db_error.to_string(),
                },
            },
            sqlx::Error::PoolTimedOut => Self::QueryCanceled {
                message: error.to_string(),
            },
            _ => Self::Database {
                message: error.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, BackfillError>;
