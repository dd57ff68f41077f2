//! Table descriptors.
//!
//! [`Table`] binds a record type to a table name and an ordered list of
//! [`Column`]s. Storage backends keep tables of different record types side
//! by side through the object-safe [`AnyTable`] trait and recover the typed
//! descriptor with [`AnyTable::as_any`] when an operation names a record
//! type.
//!
//! # Examples
//!
//! ```
//! use tablemap_core::{Column, Table};
//!
//! #[derive(Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! let users = Table::new("users")
//!     .column(Column::new("id", |u: &User| &u.id, |u: &mut User| &mut u.id).primary_key().not_null())
//!     .column(Column::new("name", |u: &User| &u.name, |u: &mut User| &mut u.name).not_null());
//!
//! assert_eq!(
//!     users.column_definitions(),
//!     "id INTEGER PRIMARY KEY NOT NULL, name TEXT NOT NULL"
//! );
//! assert_eq!(users.primary_key_columns().count(), 1);
//! ```

use std::any::{Any, TypeId, type_name};

use crate::binding::{Binder, RowSource};
use crate::column::{Column, FieldKey, TableInfo};

/// Descriptor mapping record type `T` to a table.
#[derive(Debug)]
pub struct Table<T> {
    name: String,
    columns: Vec<Column<T>>,
}

impl<T> Table<T> {
    /// Creates a table with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a column; declaration order is the table's column order.
    #[must_use]
    pub fn column(mut self, column: Column<T>) -> Self {
        self.columns.push(column);
        self
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[Column<T>] {
        &self.columns
    }

    /// Columns that carry `PRIMARY KEY`.
    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column<T>> {
        self.columns.iter().filter(|c| c.is_primary_key())
    }

    /// Columns that do not carry `PRIMARY KEY`.
    pub fn non_primary_key_columns(&self) -> impl Iterator<Item = &Column<T>> {
        self.columns.iter().filter(|c| !c.is_primary_key())
    }

    /// Finds the column mapped to the field identified by `key`.
    pub fn find_column(&self, key: &FieldKey) -> Option<&Column<T>> {
        self.columns.iter().find(|c| c.key() == key)
    }

    /// The column named `name`, compared ASCII case-insensitively as SQLite
    /// compares identifiers.
    pub fn column_named(&self, name: &str) -> Option<&Column<T>> {
        self.columns
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// The `CREATE TABLE` column list, comma separated.
    pub fn column_definitions(&self) -> String {
        self.columns
            .iter()
            .map(Column::definition)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Binds every non-key column of `record`, numbering slots from 1.
    ///
    /// Returns the number of parameters bound.
    pub fn bind_non_primary_key<B: Binder>(
        &self,
        binder: &mut B,
        record: &T,
    ) -> Result<usize, B::Error> {
        let mut slot = 0;
        for column in self.non_primary_key_columns() {
            slot += 1;
            column.bind(binder, slot, record)?;
        }
        Ok(slot)
    }

    /// Binds every column of `record`, numbering slots from 1.
    ///
    /// Returns the number of parameters bound.
    pub fn bind_all<B: Binder>(&self, binder: &mut B, record: &T) -> Result<usize, B::Error> {
        for (index, column) in self.columns.iter().enumerate() {
            column.bind(binder, index + 1, record)?;
        }
        Ok(self.columns.len())
    }

    /// Materializes one record from the current row.
    ///
    /// Result columns are matched to mapped columns by name, so the live
    /// column order may differ from the declared one. Result columns with no
    /// mapped counterpart are ignored. When the row reports no name for a
    /// column it is read positionally.
    pub fn extract<R: RowSource>(&self, row: &R) -> Result<T, R::Error>
    where
        T: Default,
    {
        let mut record = T::default();
        for index in 0..row.column_count() {
            let column = match row.column_name(index) {
                Some(name) => self.column_named(name),
                None => self.columns.get(index),
            };
            if let Some(column) = column {
                column.extract(row, index, &mut record)?;
            }
        }
        Ok(record)
    }
}

/// Type-erased view of a [`Table`].
pub trait AnyTable: Send + Sync {
    /// Table name.
    fn name(&self) -> &str;

    /// Type id of the mapped record type.
    fn record_type(&self) -> TypeId;

    /// Name of the mapped record type.
    fn record_name(&self) -> &'static str;

    /// Declared columns in `PRAGMA table_info` shape, in declaration order.
    fn table_info(&self) -> Vec<TableInfo>;

    /// Name of the column mapped to `key`, if the field is mapped.
    fn column_name(&self, key: &FieldKey) -> Option<&str>;

    /// Names of all columns in declaration order.
    fn column_names(&self) -> Vec<&str>;

    /// The `CREATE TABLE` column list.
    fn column_definitions(&self) -> String;

    /// Upcast used to recover the typed [`Table`].
    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> AnyTable for Table<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn record_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn record_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn table_info(&self) -> Vec<TableInfo> {
        (0_i64..)
            .zip(&self.columns)
            .map(|(cid, column)| column.info(cid))
            .collect()
    }

    fn column_name(&self, key: &FieldKey) -> Option<&str> {
        self.find_column(key).map(Column::name)
    }

    fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    fn column_definitions(&self) -> String {
        Self::column_definitions(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
