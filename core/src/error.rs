//! Error types for mapping and expression operations.
//!
//! These errors never touch the database: they describe a record type or
//! field that the declared mapping cannot resolve, a value that cannot be
//! converted into the field's Rust type, or a descriptor that violates the
//! table invariants.

use thiserror::Error;

/// Errors raised while resolving mappings, serializing expressions, or
/// converting column values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// The record type has no table descriptor.
    #[error("type is not mapped: {0}")]
    TypeIsNotMapped(String),

    /// The referenced field is not one of the table's mapped columns.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// A column value could not be converted into the field's type.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A table or column name cannot be used unquoted in generated SQL.
    #[error("invalid identifier '{0}': must start with a letter or underscore, contain only alphanumeric characters and underscores, and not be an SQL keyword")]
    InvalidIdentifier(String),

    /// The table descriptor violates a structural invariant.
    #[error("invalid table '{table}': {reason}")]
    InvalidTable {
        /// Name of the offending table.
        table: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Convenience alias for results with [`MappingError`].
pub type Result<T> = std::result::Result<T, MappingError>;
