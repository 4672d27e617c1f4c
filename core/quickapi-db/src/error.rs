//! Error types for connection management.

use thiserror::Error;

/// Result type for database handle operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors raised while opening or borrowing the connection.
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SQLite.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A previous holder of the connection panicked.
    #[error("database connection lock poisoned")]
    Poisoned,
}
