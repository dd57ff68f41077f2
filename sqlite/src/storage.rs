//! The storage composition root.
//!
//! [`Storage`] owns one SQLite connection and the set of table descriptors
//! it manages. Operations name their target table through the record type
//! (`insert::<User>`) or a typed [`Field`], never through SQL strings.
//!
//! # Example
//!
//! ```
//! use tablemap_core::{AnyTable, Column, SyncSchemaResult, Table, field};
//! use tablemap_sqlite::Storage;
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
//! let tables: Vec<Box<dyn AnyTable>> = vec![Box::new(users)];
//!
//! let storage = Storage::open_in_memory(tables).unwrap();
//! let synced = storage.sync_schema(false).unwrap();
//! assert_eq!(synced["users"], SyncSchemaResult::NewTableCreated);
//!
//! storage.replace(&User { id: 3, name: "Ted".into() }).unwrap();
//! let found: Vec<User> = storage.get_all(Some(field(|u: &User| &u.id).eq(3))).unwrap();
//! assert_eq!(found, vec![User { id: 3, name: "Ted".into() }]);
//! ```

use std::any::type_name;
use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::Connection;
use tablemap_core::{
    AnyTable, ColumnRef, Expression, Field, MappingError, SchemaProvider, SerializeContext,
    SyncSchemaResult, Table, TableInfo, Value, literal_sql, validate_tables,
};
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::statement::Statement;
use crate::sync;

/// A database connection plus the tables mapped onto it.
///
/// All operations run synchronously on the single held connection.
/// Concurrent use must be serialized by the caller.
pub struct Storage {
    conn: Connection,
    tables: Vec<Box<dyn AnyTable>>,
    config: StorageConfig,
}

impl Storage {
    /// Opens (or creates) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a descriptor error if any table fails validation, or
    /// [`StorageError::Driver`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, tables: Vec<Box<dyn AnyTable>>) -> Result<Self> {
        Self::from_config(StorageConfig::file(path.as_ref()), tables)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns a descriptor error if any table fails validation.
    pub fn open_in_memory(tables: Vec<Box<dyn AnyTable>>) -> Result<Self> {
        Self::from_config(StorageConfig::default(), tables)
    }

    /// Opens the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a descriptor error if any table fails validation, or
    /// [`StorageError::Driver`] if the connection cannot be opened or
    /// configured.
    pub fn from_config(config: StorageConfig, tables: Vec<Box<dyn AnyTable>>) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        Self::with_connection(conn, tables, config)
    }

    /// Wraps an already open connection.
    ///
    /// # Errors
    ///
    /// Returns a descriptor error if any table fails validation, or
    /// [`StorageError::Driver`] if applying `config` fails.
    pub fn with_connection(
        conn: Connection,
        tables: Vec<Box<dyn AnyTable>>,
        config: StorageConfig,
    ) -> Result<Self> {
        validate_tables(&tables)?;
        if config.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        if let Some(timeout) = config.busy_timeout() {
            conn.busy_timeout(timeout)?;
        }
        debug!(tables = tables.len(), path = ?config.path, "Opened storage");
        Ok(Self {
            conn,
            tables,
            config,
        })
    }

    /// The underlying connection.
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// The configuration this storage was opened with.
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The managed table descriptors.
    pub fn tables(&self) -> &[Box<dyn AnyTable>] {
        &self.tables
    }

    // Schema management

    /// Synchronizes every managed table with its descriptor.
    ///
    /// `preserve` keeps the rows of tables whose live schema carries
    /// undeclared columns; without it such tables are dropped and
    /// recreated. Tables are processed in declaration order and the first
    /// failure aborts the pass.
    ///
    /// # Errors
    ///
    /// [`StorageError::Driver`] for any failing statement and
    /// [`StorageError::BackupNameExhausted`] if no backup table name is
    /// free.
    pub fn sync_schema(&self, preserve: bool) -> Result<BTreeMap<String, SyncSchemaResult>> {
        let mut results = BTreeMap::new();
        for table in &self.tables {
            let result = sync::synchronize(
                &self.conn,
                table.as_ref(),
                preserve,
                self.config.max_backup_probes,
            )?;
            results.insert(table.name().to_string(), result);
        }
        Ok(results)
    }

    /// [`sync_schema`](Self::sync_schema) with the configured
    /// `preserve_extra_columns`.
    ///
    /// # Errors
    ///
    /// See [`sync_schema`](Self::sync_schema).
    pub fn sync_schema_default(&self) -> Result<BTreeMap<String, SyncSchemaResult>> {
        self.sync_schema(self.config.preserve_extra_columns)
    }

    /// Returns `true` if a table named `name` exists in the database.
    ///
    /// # Errors
    ///
    /// [`StorageError::Driver`] if the catalog query fails.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        sync::table_exists(&self.conn, name)
    }

    /// Names of all tables in the database, sorted.
    ///
    /// # Errors
    ///
    /// [`StorageError::Driver`] if the catalog query fails.
    pub fn table_names(&self) -> Result<Vec<String>> {
        sync::table_names(&self.conn)
    }

    /// Live columns of table `name`; empty if the table does not exist.
    ///
    /// # Errors
    ///
    /// [`StorageError::Driver`] if the pragma fails.
    pub fn table_info(&self, name: &str) -> Result<Vec<TableInfo>> {
        sync::table_info(&self.conn, name)
    }

    /// Runs `f` inside a transaction, committing on `Ok` and rolling back
    /// on `Err`.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, or [`StorageError::Driver`] if the
    /// transaction cannot be opened or committed.
    pub fn transaction<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    // Records

    fn table<T: 'static>(&self) -> Result<&Table<T>> {
        self.tables
            .iter()
            .find_map(|t| t.as_any().downcast_ref::<Table<T>>())
            .ok_or_else(|| StorageError::TypeIsNotMapped(type_name::<T>().to_string()))
    }

    fn where_clause(&self, filter: Option<&Expression>) -> Result<String> {
        match filter {
            Some(expr) => {
                let sql = expr.serialize(&SerializeContext::new(self))?;
                Ok(format!(" WHERE {sql}"))
            }
            None => Ok(String::new()),
        }
    }

    /// Inserts `record`, letting the engine assign primary-key columns.
    ///
    /// Returns the rowid of the new row.
    ///
    /// # Errors
    ///
    /// [`StorageError::TypeIsNotMapped`] if `T` has no table, or
    /// [`StorageError::Driver`] if binding or execution fails.
    pub fn insert<T: 'static>(&self, record: &T) -> Result<i64> {
        let table = self.table::<T>()?;
        let names: Vec<&str> = table.non_primary_key_columns().map(|c| c.name()).collect();
        let sql = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table.name())
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table.name(),
                names.join(", "),
                placeholders(names.len())
            )
        };
        let mut stmt = Statement::prepare(&self.conn, &sql)?;
        table.bind_non_primary_key(&mut stmt, record)?;
        stmt.execute()?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Inserts `record` with every column bound, replacing any row that
    /// conflicts on a unique or primary key.
    ///
    /// # Errors
    ///
    /// [`StorageError::TypeIsNotMapped`] if `T` has no table, or
    /// [`StorageError::Driver`] if binding or execution fails.
    pub fn replace<T: 'static>(&self, record: &T) -> Result<()> {
        let table = self.table::<T>()?;
        let names: Vec<&str> = table.columns().iter().map(|c| c.name()).collect();
        let sql = format!(
            "REPLACE INTO {} ({}) VALUES ({})",
            table.name(),
            names.join(", "),
            placeholders(names.len())
        );
        let mut stmt = Statement::prepare(&self.conn, &sql)?;
        table.bind_all(&mut stmt, record)?;
        stmt.execute()?;
        Ok(())
    }

    /// Loads every row of `T`'s table matching `filter`, in engine order.
    ///
    /// # Errors
    ///
    /// Mapping errors if `T` or a filtered field is not mapped,
    /// [`StorageError::Conversion`] if a stored value does not fit its
    /// field, or [`StorageError::Driver`].
    pub fn get_all<T: Default + 'static>(&self, filter: Option<Expression>) -> Result<Vec<T>> {
        let table = self.table::<T>()?;
        let sql = format!(
            "SELECT * FROM {}{}",
            table.name(),
            self.where_clause(filter.as_ref())?
        );
        let mut stmt = Statement::prepare(&self.conn, &sql)?;
        stmt.query_map(|row| table.extract(row))
    }

    /// Deletes every row of `T`'s table matching `filter`.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Mapping errors if `T` or a filtered field is not mapped, or
    /// [`StorageError::Driver`].
    pub fn delete_all<T: 'static>(&self, filter: Option<Expression>) -> Result<usize> {
        let table = self.table::<T>()?;
        let sql = format!(
            "DELETE FROM {}{}",
            table.name(),
            self.where_clause(filter.as_ref())?
        );
        Statement::prepare(&self.conn, &sql)?.execute()
    }

    // Aggregates

    fn aggregate(
        &self,
        function: &str,
        column: &ColumnRef,
        argument: Option<&str>,
        filter: Option<&Expression>,
    ) -> Result<Value> {
        let (table, name) = self.resolve(column)?;
        let args = match argument {
            Some(arg) => format!("{name}, {arg}"),
            None => name.to_string(),
        };
        let sql = format!(
            "SELECT {function}({args}) FROM {table}{}",
            self.where_clause(filter)?
        );
        Statement::prepare(&self.conn, &sql)?.query_scalar()
    }

    /// `MIN(column)`; `None` when no non-null value matches.
    ///
    /// # Errors
    ///
    /// [`StorageError::TypeIsNotMapped`] or [`StorageError::ColumnNotFound`]
    /// if the field is not mapped, or [`StorageError::Driver`].
    pub fn min<T: 'static, F>(
        &self,
        field: Field<T, F>,
        filter: Option<Expression>,
    ) -> Result<Option<Value>> {
        let value = self.aggregate("MIN", &field.into(), None, filter.as_ref())?;
        Ok(value.non_null())
    }

    /// `MAX(column)`; `None` when no non-null value matches.
    ///
    /// # Errors
    ///
    /// See [`min`](Self::min).
    pub fn max<T: 'static, F>(
        &self,
        field: Field<T, F>,
        filter: Option<Expression>,
    ) -> Result<Option<Value>> {
        let value = self.aggregate("MAX", &field.into(), None, filter.as_ref())?;
        Ok(value.non_null())
    }

    /// `AVG(column)`; `None` when no non-null value matches.
    ///
    /// # Errors
    ///
    /// See [`min`](Self::min); [`StorageError::Conversion`] if the engine
    /// returns a non-numeric value.
    pub fn avg<T: 'static, F>(
        &self,
        field: Field<T, F>,
        filter: Option<Expression>,
    ) -> Result<Option<f64>> {
        match self.aggregate("AVG", &field.into(), None, filter.as_ref())? {
            Value::Null => Ok(None),
            value => value.as_f64().map(Some).ok_or_else(|| {
                StorageError::Conversion(format!("AVG returned {:?}", value.value_type()))
            }),
        }
    }

    /// `COUNT(column)`: the number of non-null values matching `filter`.
    ///
    /// # Errors
    ///
    /// See [`min`](Self::min).
    pub fn count<T: 'static, F>(&self, field: Field<T, F>, filter: Option<Expression>) -> Result<i64> {
        let value = self.aggregate("COUNT", &field.into(), None, filter.as_ref())?;
        count_value(&value)
    }

    /// `COUNT(*)` over `T`'s table.
    ///
    /// # Errors
    ///
    /// [`StorageError::TypeIsNotMapped`] if `T` has no table, mapping
    /// errors from `filter`, or [`StorageError::Driver`].
    pub fn count_all<T: 'static>(&self, filter: Option<Expression>) -> Result<i64> {
        let table = self.table::<T>()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            table.name(),
            self.where_clause(filter.as_ref())?
        );
        let value = Statement::prepare(&self.conn, &sql)?.query_scalar()?;
        count_value(&value)
    }

    /// `GROUP_CONCAT(column)` with the engine's default `,` separator;
    /// `None` when no non-null value matches.
    ///
    /// # Errors
    ///
    /// See [`min`](Self::min).
    pub fn group_concat<T: 'static, F>(
        &self,
        field: Field<T, F>,
        filter: Option<Expression>,
    ) -> Result<Option<String>> {
        let value = self.aggregate("GROUP_CONCAT", &field.into(), None, filter.as_ref())?;
        concat_value(value)
    }

    /// `GROUP_CONCAT(column, 'separator')`.
    ///
    /// # Errors
    ///
    /// See [`min`](Self::min).
    pub fn group_concat_with<T: 'static, F>(
        &self,
        field: Field<T, F>,
        separator: &str,
        filter: Option<Expression>,
    ) -> Result<Option<String>> {
        let separator = literal_sql(&Value::from(separator));
        let value = self.aggregate(
            "GROUP_CONCAT",
            &field.into(),
            Some(&separator),
            filter.as_ref(),
        )?;
        concat_value(value)
    }
}

impl SchemaProvider for Storage {
    fn resolve(&self, column: &ColumnRef) -> std::result::Result<(&str, &str), MappingError> {
        self.tables.resolve(column)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn count_value(value: &Value) -> Result<i64> {
    match value {
        Value::Null => Ok(0),
        Value::Integer(n) => Ok(*n),
        other => Err(StorageError::Conversion(format!(
            "COUNT returned {:?}",
            other.value_type()
        ))),
    }
}

fn concat_value(value: Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        Value::Integer(n) => Ok(Some(n.to_string())),
        Value::Real(v) => Ok(Some(v.to_string())),
        Value::Blob(_) => Err(StorageError::Conversion(
            "GROUP_CONCAT returned a blob".to_string(),
        )),
    }
}
