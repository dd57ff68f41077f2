//! Engine-independent mapping primitives for tablemap.
//!
//! This crate describes how record types map onto relational tables and
//! everything that can be decided without touching a database:
//!
//! - [`Column`] and [`Table`] declare the mapping. Columns capture a field's
//!   accessors as bind/extract functions, so values move between records
//!   and statements through the [`Binder`] and [`RowSource`] traits.
//! - [`field`] yields a typed [`Field`] reference used to build
//!   [`Expression`]s, which serialize to `WHERE` fragments through a
//!   [`SchemaProvider`].
//! - [`diff_columns`] compares declared and live columns and
//!   [`SchemaDiff::classify`] picks the [`SyncSchemaResult`].
//! - [`validate_tables`] rejects descriptors that would generate invalid
//!   SQL.
//!
//! The SQLite backend lives in `tablemap-sqlite`.
//!
//! # Example
//!
//! ```
//! use tablemap_core::*;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! let users = Table::new("users")
//!     .column(Column::new("id", |u: &User| &u.id, |u: &mut User| &mut u.id).primary_key().not_null())
//!     .column(Column::new("name", |u: &User| &u.name, |u: &mut User| &mut u.name).not_null());
//!
//! let tables: Vec<Box<dyn AnyTable>> = vec![Box::new(users)];
//! validate_tables(&tables).unwrap();
//!
//! let filter = field(|u: &User| &u.id).eq(3);
//! assert_eq!(
//!     filter.serialize(&SerializeContext::new(&tables)).unwrap(),
//!     "users.id = 3"
//! );
//! ```

mod binding;
mod column;
mod error;
mod expr;
mod sync;
mod table;
mod types;
mod validate;

pub use binding::{Binder, RowSource};
pub use column::{Column, Field, FieldKey, TableInfo, field};
pub use error::{MappingError, Result};
pub use expr::{
    BinaryOperator, ColumnRef, Expression, LogicalOperator, SchemaProvider, SerializeContext,
    equal, greater_or_equal, greater_than, lesser_or_equal, lesser_than, literal, literal_sql,
    not_equal,
};
pub use sync::{SchemaDiff, SyncAction, SyncSchemaResult, diff_columns};
pub use table::{AnyTable, Table};
pub use types::{ColumnType, SqlType, Value, ValueType};
pub use validate::{is_keyword, validate_identifier, validate_table, validate_tables};
