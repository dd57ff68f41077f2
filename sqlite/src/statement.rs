//! Prepared statement guard and the rusqlite side of the binding protocol.
//!
//! [`Statement`] owns a `rusqlite::Statement` for the duration of one call.
//! It is the [`Binder`] handed to column descriptors, and every row it
//! yields is wrapped in a [`SqliteRow`] implementing [`RowSource`]. The
//! underlying statement is finalized when the guard drops, on every exit
//! path.

use rusqlite::Connection;
use rusqlite::types::{Type, ValueRef};
use tablemap_core::{Binder, RowSource, Value, ValueType};
use tracing::debug;

use crate::error::{Result, StorageError};

/// A prepared statement scoped to one operation.
pub(crate) struct Statement<'conn> {
    inner: rusqlite::Statement<'conn>,
}

impl<'conn> Statement<'conn> {
    /// Prepares `sql` on `conn`.
    pub(crate) fn prepare(conn: &'conn Connection, sql: &str) -> Result<Self> {
        debug!(sql, "Preparing statement");
        Ok(Self {
            inner: conn.prepare(sql)?,
        })
    }

    /// Runs a statement that returns no rows, stepping it to completion.
    pub(crate) fn execute(&mut self) -> Result<usize> {
        Ok(self.inner.raw_execute()?)
    }

    /// Steps through every row, mapping each with `f`.
    pub(crate) fn query_map<T>(
        &mut self,
        mut f: impl FnMut(&SqliteRow<'_, '_>) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut rows = self.inner.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(f(&SqliteRow { row })?);
        }
        Ok(out)
    }

    /// Steps once and reads the first result column, `Null` when the
    /// statement yields no row.
    pub(crate) fn query_scalar(&mut self) -> Result<Value> {
        let mut rows = self.inner.raw_query();
        match rows.next()? {
            Some(row) => SqliteRow { row }.read_value(0),
            None => Ok(Value::Null),
        }
    }
}

impl Binder for Statement<'_> {
    type Error = StorageError;

    fn bind(&mut self, slot: usize, value: Value) -> Result<()> {
        self.inner.raw_bind_parameter(slot, to_sql(value))?;
        Ok(())
    }
}

fn to_sql(value: Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Integer(v) => Sql::Integer(v),
        Value::Real(v) => Sql::Real(v),
        Value::Text(v) => Sql::Text(v),
        Value::Blob(v) => Sql::Blob(v),
    }
}

/// The current row of a running [`Statement`].
pub(crate) struct SqliteRow<'r, 'stmt> {
    row: &'r rusqlite::Row<'stmt>,
}

impl SqliteRow<'_, '_> {
    fn get(&self, index: usize) -> Result<ValueRef<'_>> {
        Ok(self.row.get_ref(index)?)
    }

    fn mismatch(&self, index: usize, expected: &str, found: ValueRef<'_>) -> StorageError {
        StorageError::Conversion(format!(
            "column {index}: expected {expected}, found {}",
            found.data_type()
        ))
    }
}

impl RowSource for SqliteRow<'_, '_> {
    type Error = StorageError;

    fn column_count(&self) -> usize {
        self.row.as_ref().column_count()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.row.as_ref().column_name(index).ok()
    }

    fn value_type(&self, index: usize) -> Result<ValueType> {
        Ok(match self.get(index)?.data_type() {
            Type::Null => ValueType::Null,
            Type::Integer => ValueType::Integer,
            Type::Real => ValueType::Real,
            Type::Text => ValueType::Text,
            Type::Blob => ValueType::Blob,
        })
    }

    fn read_integer(&self, index: usize) -> Result<i64> {
        match self.get(index)? {
            ValueRef::Integer(v) => Ok(v),
            other => Err(self.mismatch(index, "integer", other)),
        }
    }

    fn read_real(&self, index: usize) -> Result<f64> {
        match self.get(index)? {
            ValueRef::Real(v) => Ok(v),
            other => Err(self.mismatch(index, "real", other)),
        }
    }

    fn read_text(&self, index: usize) -> Result<String> {
        match self.get(index)? {
            ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec()).map_err(|e| {
                StorageError::Conversion(format!("column {index}: invalid UTF-8: {e}"))
            }),
            other => Err(self.mismatch(index, "text", other)),
        }
    }

    fn read_blob(&self, index: usize) -> Result<Vec<u8>> {
        match self.get(index)? {
            ValueRef::Blob(bytes) => Ok(bytes.to_vec()),
            other => Err(self.mismatch(index, "blob", other)),
        }
    }
}
