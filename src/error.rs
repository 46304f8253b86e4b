//! Error types for `todo_service`.
//!
//! Every fallible operation returns [`TodoError`]. Callers that only need to
//! branch on the outcome (the HTTP layer, mostly) use [`TodoError::kind`],
//! which folds the variants into the three outcomes a client can observe.

use std::time::Duration;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = TodoError> = std::result::Result<T, E>;

/// Coarse classification of a [`TodoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input rejected before reaching the database.
    Validation,
    /// The targeted todo does not exist.
    NotFound,
    /// Anything originating from the database, the pool, or the runtime.
    Store,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Store => "store",
        }
    }
}

#[derive(Debug, Error)]
pub enum TodoError {
    // === Validation ===
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("no fields to update")]
    EmptyPatch,

    // === Existence ===
    #[error("todo not found: {id}")]
    NotFound { id: i64 },

    // === Store ===
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("statement cancelled")]
    Cancelled,

    #[error("statement deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("timed out after {0:?} waiting for a database connection")]
    PoolTimeout(Duration),

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("blocking database task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    // === Bootstrap ===
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TodoError {
    /// Create a validation error for the named field.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Classify the error.
    ///
    /// An interrupted `SQLite` statement is reported by rusqlite as a plain
    /// database error; it is still a store-side failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::EmptyPatch => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Database(_)
            | Self::Cancelled
            | Self::DeadlineExceeded(_)
            | Self::PoolTimeout(_)
            | Self::PoolClosed
            | Self::TaskFailed(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Yaml(_) => ErrorKind::Store,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true when `SQLite` aborted the statement via its interrupt handle.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Database(err) => {
                err.sqlite_error_code() == Some(rusqlite::ErrorCode::OperationInterrupted)
            }
            _ => false,
        }
    }
}
