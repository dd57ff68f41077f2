//! Error types for SQLite storage operations.
//!
//! [`StorageError`] flattens the mapping errors of `tablemap-core` next to
//! driver, configuration and migration failures, so callers match a single
//! level.

use tablemap_core::MappingError;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The record type has no table descriptor.
    #[error("type is not mapped: {0}")]
    TypeIsNotMapped(String),

    /// The field is not mapped by its table.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// A stored value does not fit the field type.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A table or column name is not a plain identifier, or is a keyword.
    #[error("invalid identifier '{0}': must contain only ASCII letters, digits and underscores, not start with a digit, and not be an SQL keyword")]
    InvalidIdentifier(String),

    /// A table descriptor violates a structural rule.
    #[error("invalid table '{table}': {reason}")]
    InvalidTable {
        /// Table name.
        table: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The engine reported a failure. `code` is the extended result code
    /// when the engine produced one; `message` is its diagnostic verbatim.
    #[error("database error: {message}")]
    Driver {
        /// Extended SQLite result code.
        code: Option<i32>,
        /// Engine diagnostic.
        message: String,
    },

    /// Every candidate backup table name was already taken.
    #[error("no free backup table name for '{table}' after {attempts} attempts")]
    BackupNameExhausted {
        /// Table being migrated.
        table: String,
        /// Number of names probed.
        attempts: usize,
    },

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StorageError {
    /// Extended SQLite result code, for driver failures that carry one.
    pub const fn driver_code(&self) -> Option<i32> {
        match self {
            Self::Driver { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => Self::Driver {
                code: Some(failure.extended_code),
                message: message.unwrap_or_else(|| failure.to_string()),
            },
            rusqlite::Error::SqlInputError { error, msg, .. } => Self::Driver {
                code: Some(error.extended_code),
                message: msg,
            },
            other => Self::Driver {
                code: None,
                message: other.to_string(),
            },
        }
    }
}

impl From<MappingError> for StorageError {
    fn from(err: MappingError) -> Self {
        match err {
            MappingError::TypeIsNotMapped(name) => Self::TypeIsNotMapped(name),
            MappingError::ColumnNotFound(desc) => Self::ColumnNotFound(desc),
            MappingError::Conversion(msg) => Self::Conversion(msg),
            MappingError::InvalidIdentifier(name) => Self::InvalidIdentifier(name),
            MappingError::InvalidTable { table, reason } => Self::InvalidTable { table, reason },
        }
    }
}

/// Convenience alias for results with [`StorageError`].
pub type Result<T> = std::result::Result<T, StorageError>;
