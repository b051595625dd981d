//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          CoreError (kosh-core rules)        │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ← classifies constraint / busy / pool failures  │
//! │       │                                                                 │
//! │       ├── is_retryable()? → RetryPolicy runs the transaction again     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (kosh-api) ← ErrorKind decides the HTTP status               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kosh_core::{CoreError, ErrorKind};
use thiserror::Error;

// SQLite extended result codes we classify on.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";
const SQLITE_BUSY_RECOVERY: &str = "261";
const SQLITE_LOCKED_SHAREDCACHE: &str = "262";
const SQLITE_BUSY_SNAPSHOT: &str = "517";
const SQLITE_CONSTRAINT_TRIGGER: &str = "1811";

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate SKU
    /// - Duplicate order or invoice number
    /// - Two writers appending the same ledger position
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The database is locked by another writer.
    ///
    /// Retryable; surfaces as a conflict once retries run out.
    #[error("Database is busy")]
    Busy,

    /// A concurrent update or an immutability rule rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No fresh identifier could be minted within the retry budget.
    #[error("Could not allocate a unique {scope} number for {period}")]
    SequenceExhausted { scope: String, period: String },

    /// A domain rule failed inside a transaction.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether running the whole transaction again may succeed.
    ///
    /// ```text
    /// Busy                                  → yes (lock contention)
    /// UniqueViolation on a minted number    → yes (fresh ordinal next time)
    /// UniqueViolation on a ledger position  → yes (re-read previous stock)
    /// anything else                         → no
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Busy => true,
            DbError::UniqueViolation { field, .. } => {
                field.contains("order_number")
                    || field.contains("invoice_number")
                    || field.contains("ledger_seq")
            }
            _ => false,
        }
    }

    /// Caller-facing class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. }
            | DbError::ForeignKeyViolation { .. }
            | DbError::Busy
            | DbError::Conflict(_)
            | DbError::SequenceExhausted { .. } => ErrorKind::Conflict,
            DbError::Domain(err) => err.kind(),
            DbError::ConnectionFailed(_) | DbError::PoolExhausted => ErrorKind::Unavailable,
            DbError::MigrationFailed(_) | DbError::QueryFailed(_) | DbError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → code / message decide:
///     5, 6, 261, 262, 517     → Busy
///     UNIQUE constraint       → UniqueViolation
///     FOREIGN KEY constraint  → ForeignKeyViolation
///     trigger RAISE(ABORT)    → Conflict
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed/Io  → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();
                let code = code.as_deref().unwrap_or_default();

                if matches!(
                    code,
                    SQLITE_BUSY
                        | SQLITE_LOCKED
                        | SQLITE_BUSY_RECOVERY
                        | SQLITE_LOCKED_SHAREDCACHE
                        | SQLITE_BUSY_SNAPSHOT
                ) || msg.contains("database is locked")
                {
                    DbError::Busy
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<column>[, <table>.<column>]"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if code == SQLITE_CONSTRAINT_TRIGGER || msg.contains("immutable") {
                    DbError::Conflict(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<kosh_core::ValidationError> for DbError {
    fn from(err: kosh_core::ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
