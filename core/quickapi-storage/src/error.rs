//! Error types for the storage layer.

use quickapi_db::DbError;
use quickapi_model::ModelError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Classification of a failure reported by SQLite.
///
/// Derived from the structured error code at the engine boundary, never from
/// the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The statement was rejected because of the data it carried.
    BadInput,
    /// The store is momentarily unavailable; the same call may succeed later.
    Transient,
    /// Anything else: I/O, corruption, malformed statements.
    Internal,
}

impl StoreErrorKind {
    #[must_use]
    pub fn classify(err: &rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, _) => match e.code {
                ErrorCode::ConstraintViolation
                | ErrorCode::TypeMismatch
                | ErrorCode::TooBig
                | ErrorCode::ParameterOutOfRange => Self::BadInput,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Self::Transient,
                _ => Self::Internal,
            },
            rusqlite::Error::ToSqlConversionFailure(_)
            | rusqlite::Error::InvalidParameterCount(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => Self::BadInput,
            _ => Self::Internal,
        }
    }
}

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No row matched the id (and any active scope predicates).
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed or unstorable input; the caller must correct it.
    #[error("validation error: {0}")]
    Validation(String),

    /// The entity cannot be served as declared. Fatal at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure surfaced from SQLite.
    #[error("store error ({kind:?}): {source}")]
    Store {
        kind: StoreErrorKind,
        #[source]
        source: rusqlite::Error,
    },

    /// A previous holder of the connection panicked.
    #[error("database connection lock poisoned")]
    Poisoned,
}

impl StorageError {
    /// Whether the caller supplied input it must correct.
    #[must_use]
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Store {
                    kind: StoreErrorKind::BadInput,
                    ..
                }
        )
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Store {
                kind: StoreErrorKind::Transient,
                ..
            }
        )
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Store {
            kind: StoreErrorKind::classify(&source),
            source,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlite(e) => e.into(),
            DbError::Poisoned => Self::Poisoned,
        }
    }
}

impl From<ModelError> for StorageError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidRecord(e) => Self::Validation(e.to_string()),
            ModelError::Rejected(msg) => Self::Validation(msg),
            ModelError::UnknownKind(kind) => {
                Self::Configuration(format!("unsupported entity kind '{kind}'"))
            }
        }
    }
}
