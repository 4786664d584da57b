//! Storage error taxonomy.
//!
//! [`StoreError`] is returned by every pool, session, repository, and
//! workflow operation. Driver errors are classified on conversion so callers
//! can branch on intent (retry, conflict, not found) instead of driver codes.

use std::borrow::Cow;

/// Errors raised by the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A session was requested before the pool was initialized.
    #[error("connection pool used before initialization")]
    PoolUninitialized,

    /// `initialize` was called on a pool that is already running.
    #[error("connection pool is already initialized")]
    PoolAlreadyInitialized,

    /// The pool has been shut down and accepts no new acquisitions.
    #[error("connection pool has been shut down")]
    PoolClosed,

    /// No connection became available within the acquire timeout.
    #[error("connection pool exhausted after waiting {waited_ms} ms")]
    PoolExhausted {
        /// Time spent waiting before giving up.
        waited_ms: u64,
    },

    /// The backend is unreachable or a connection broke mid-operation.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A filter referenced an unknown column or carried a mistyped value.
    #[error("invalid filter `{key}` for {table}: {reason}")]
    InvalidFilter {
        /// Table the filter was applied to.
        table: &'static str,
        /// Offending filter key.
        key: String,
        /// Why the filter was rejected.
        reason: String,
    },

    /// A workflow required an entity that does not exist.
    #[error("{table} record not found: {id}")]
    NotFound {
        /// Table that was searched.
        table: &'static str,
        /// Identifier that was not found.
        id: String,
    },

    /// A unique, foreign-key, or check constraint was violated.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// The transaction lost a race (serialization failure, deadlock, busy
    /// database) or was aborted by an earlier failed statement.
    #[error("transaction conflict: {0}")]
    TransactionConflict(String),

    /// Writing the archive snapshot failed; the deletion was rolled back.
    #[error("archive write for {table} {id} failed: {source}")]
    ArchiveWriteFailed {
        /// Table of the entity being deleted.
        table: &'static str,
        /// Identifier of the entity being deleted.
        id: String,
        /// Underlying failure.
        #[source]
        source: Box<StoreError>,
    },

    /// A session or unit of work was used against its contract.
    #[error("unit of work misuse: {0}")]
    UnitOfWorkMisuse(&'static str),

    /// A stored row could not be decoded into its entity.
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    /// Entity snapshot (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(String),

    /// Invalid pool or backend configuration.
    #[error("invalid storage configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns `true` when retrying the whole operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PoolExhausted { .. } | Self::ConnectionLost(_) | Self::TransactionConflict(_)
        )
    }

    /// Returns `true` for constraint or concurrency conflicts.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::IntegrityViolation(_) | Self::TransactionConflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                if db.is_unique_violation()
                    || db.is_foreign_key_violation()
                    || db.is_check_violation()
                {
                    Self::IntegrityViolation(db.message().to_string())
                } else if is_conflict_code(db.code()) {
                    Self::TransactionConflict(db.message().to_string())
                } else {
                    Self::Database(err.to_string())
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed => Self::ConnectionLost(err.to_string()),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_) => Self::CorruptRow(err.to_string()),
            _ => Self::Database(err.to_string()),
        }
    }
}

/// PostgreSQL serialization failure / deadlock, SQLite busy / locked
/// (including extended result codes).
fn is_conflict_code(code: Option<Cow<'_, str>>) -> bool {
    matches!(
        code.as_deref(),
        Some("40001" | "40P01" | "5" | "6" | "261" | "262" | "517")
    )
}
