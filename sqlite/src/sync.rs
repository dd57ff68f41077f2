//! Schema synchronization against a live SQLite database.
//!
//! The decision of what to do with a table comes from
//! [`SchemaDiff::classify`]; this module reads the live schema and executes
//! the chosen action:
//!
//! - missing table: `CREATE TABLE`
//! - appendable columns: one `ALTER TABLE .. ADD COLUMN` each
//! - extra columns kept under `preserve`: rebuild through a backup table
//! - anything else: drop and recreate
//!
//! Statements run one after another without an enclosing transaction. A
//! failure stops the sequence for that table and leaves the completed steps
//! in place.

use rusqlite::Connection;
use tablemap_core::{
    AnyTable, Binder, RowSource, SyncAction, SyncSchemaResult, TableInfo, Value, diff_columns,
};
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::statement::{SqliteRow, Statement};

/// Returns `true` if a table named `name` exists.
///
/// Table names are compared case-insensitively, as the engine resolves them.
pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let mut stmt = Statement::prepare(
        conn,
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
    )?;
    stmt.bind(1, Value::from(name))?;
    Ok(stmt.query_scalar()?.as_i64().unwrap_or(0) > 0)
}

/// Names of all user tables, sorted.
pub(crate) fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = Statement::prepare(
        conn,
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    stmt.query_map(|row| row.read_text(0))
}

/// Live column descriptions from `PRAGMA table_info`, in column order.
///
/// An unknown table yields an empty list.
pub(crate) fn table_info(conn: &Connection, name: &str) -> Result<Vec<TableInfo>> {
    let quoted = name.replace('\'', "''");
    let mut stmt = Statement::prepare(conn, &format!("PRAGMA table_info('{quoted}')"))?;
    stmt.query_map(read_table_info)
}

fn read_table_info(row: &SqliteRow<'_, '_>) -> Result<TableInfo> {
    let default_value = match row.read_value(4)? {
        Value::Null => None,
        Value::Text(text) => Some(text),
        other => Some(tablemap_core::literal_sql(&other)),
    };
    Ok(TableInfo {
        cid: row.read_integer(0)?,
        name: row.read_text(1)?,
        sql_type: row.read_text(2)?,
        not_null: row.read_integer(3)? != 0,
        default_value,
        pk: row.read_integer(5)?,
    })
}

fn exec(conn: &Connection, sql: &str) -> Result<()> {
    Statement::prepare(conn, sql)?.execute()?;
    Ok(())
}

fn create_table(conn: &Connection, name: &str, definitions: &str) -> Result<()> {
    exec(conn, &format!("CREATE TABLE '{name}' ({definitions})"))
}

fn add_column(conn: &Connection, table: &str, column: &TableInfo) -> Result<()> {
    exec(
        conn,
        &format!("ALTER TABLE {table} ADD COLUMN {}", column.definition()),
    )
}

fn drop_table(conn: &Connection, name: &str) -> Result<()> {
    exec(conn, &format!("DROP TABLE '{name}'"))
}

fn rename_table(conn: &Connection, old: &str, new: &str) -> Result<()> {
    exec(conn, &format!("ALTER TABLE {old} RENAME TO {new}"))
}

fn copy_columns(conn: &Connection, from: &str, to: &str, columns: &[&str]) -> Result<()> {
    let list = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    exec(
        conn,
        &format!("INSERT INTO {to} ({list}) SELECT {list} FROM '{from}'"),
    )
}

/// Finds a free backup name: `<table>_backup`, then `<table>_backup1`,
/// `<table>_backup2`, and so on, trying at most `max_probes` names.
pub(crate) fn backup_table_name(
    conn: &Connection,
    table: &str,
    max_probes: usize,
) -> Result<String> {
    let base = format!("{table}_backup");
    for attempt in 0..max_probes {
        let candidate = if attempt == 0 {
            base.clone()
        } else {
            format!("{base}{attempt}")
        };
        if !table_exists(conn, &candidate)? {
            return Ok(candidate);
        }
        debug!(table, candidate = %candidate, "Backup name taken");
    }
    Err(StorageError::BackupNameExhausted {
        table: table.to_string(),
        attempts: max_probes,
    })
}

/// Rebuilds `table` under its declared schema, keeping the data of
/// `kept` columns.
fn rebuild(
    conn: &Connection,
    table: &dyn AnyTable,
    kept: &[&str],
    max_probes: usize,
) -> Result<()> {
    let backup = backup_table_name(conn, table.name(), max_probes)?;
    create_table(conn, &backup, &table.column_definitions())?;
    if !kept.is_empty() {
        copy_columns(conn, table.name(), &backup, kept)?;
    }
    drop_table(conn, table.name())?;
    rename_table(conn, &backup, table.name())
}

/// Brings one table in line with its descriptor.
pub(crate) fn synchronize(
    conn: &Connection,
    table: &dyn AnyTable,
    preserve: bool,
    max_probes: usize,
) -> Result<SyncSchemaResult> {
    let name = table.name();
    if !table_exists(conn, name)? {
        create_table(conn, name, &table.column_definitions())?;
        let result = SyncSchemaResult::NewTableCreated;
        info!(table = name, result = %result, "Synchronized table");
        return Ok(result);
    }

    let declared = table.table_info();
    let live = table_info(conn, name)?;
    let diff = diff_columns(&declared, &live);
    let (action, result) = diff.classify(preserve);

    match action {
        SyncAction::Keep => {}
        SyncAction::AddColumns => {
            for column in &diff.columns_to_add {
                add_column(conn, name, column)?;
            }
        }
        SyncAction::Rebuild => {
            let removed: Vec<&str> = diff.extra_columns.iter().map(|c| c.name.as_str()).collect();
            warn!(table = name, removed = ?removed, "Rebuilding table through a backup copy");
            let kept: Vec<&str> = declared
                .iter()
                .filter(|c| !diff.columns_to_add.iter().any(|a| a.name == c.name))
                .map(|c| c.name.as_str())
                .collect();
            rebuild(conn, table, &kept, max_probes)?;
        }
        SyncAction::Recreate => {
            warn!(
                table = name,
                mismatched = ?diff.mismatched,
                "Dropping and recreating table, stored rows will be lost"
            );
            drop_table(conn, name)?;
            create_table(conn, name, &table.column_definitions())?;
        }
    }

    info!(table = name, result = %result, "Synchronized table");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablemap_core::{Column, Table};

    #[derive(Default)]
    struct Order {
        id: i64,
        total: f64,
    }

    fn orders() -> Table<Order> {
        Table::new("orders")
            .column(
                Column::new("id", |o: &Order| &o.id, |o: &mut Order| &mut o.id)
                    .primary_key()
                    .not_null(),
            )
            .column(Column::new("total", |o: &Order| &o.total, |o: &mut Order| &mut o.total))
    }

    fn conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_table_exists() {
        let conn = conn();
        assert!(!table_exists(&conn, "orders").unwrap());
        conn.execute_batch("CREATE TABLE orders (id INTEGER)").unwrap();
        assert!(table_exists(&conn, "orders").unwrap());
        assert!(table_exists(&conn, "Orders").unwrap());
    }

    #[test]
    fn test_table_info_reads_pragma() {
        let conn = conn();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY NOT NULL, name TEXT DEFAULT 'x', n INTEGER DEFAULT 3)",
        )
        .unwrap();
        let info = table_info(&conn, "t").unwrap();
        assert_eq!(info.len(), 3);
        assert!(info[0].is_primary_key());
        assert!(info[0].not_null);
        assert_eq!(info[1].default_value.as_deref(), Some("'x'"));
        assert_eq!(info[2].default_value.as_deref(), Some("3"));
        assert!(table_info(&conn, "absent").unwrap().is_empty());
    }

    #[test]
    fn test_backup_name_probe() {
        let conn = conn();
        assert_eq!(backup_table_name(&conn, "orders", 10).unwrap(), "orders_backup");

        conn.execute_batch("CREATE TABLE orders_backup (id INTEGER)").unwrap();
        assert_eq!(backup_table_name(&conn, "orders", 10).unwrap(), "orders_backup1");

        conn.execute_batch("CREATE TABLE orders_backup1 (id INTEGER)").unwrap();
        assert_eq!(backup_table_name(&conn, "orders", 10).unwrap(), "orders_backup2");
    }

    #[test]
    fn test_backup_name_probe_is_bounded() {
        let conn = conn();
        conn.execute_batch(
            "CREATE TABLE orders_backup (id INTEGER);
             CREATE TABLE orders_backup1 (id INTEGER);",
        )
        .unwrap();
        let err = backup_table_name(&conn, "orders", 2).unwrap_err();
        assert!(matches!(
            err,
            StorageError::BackupNameExhausted { attempts: 2, .. }
        ));
    }

    #[test]
    fn test_synchronize_creates_then_keeps() {
        let conn = conn();
        let table = orders();
        assert_eq!(
            synchronize(&conn, &table, false, 10).unwrap(),
            SyncSchemaResult::NewTableCreated
        );
        assert_eq!(
            synchronize(&conn, &table, false, 10).unwrap(),
            SyncSchemaResult::AlreadyInSync
        );
    }

    #[test]
    fn test_rebuild_uses_free_backup_name() {
        let conn = conn();
        conn.execute_batch(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY NOT NULL, total REAL, note TEXT);
             INSERT INTO orders VALUES (1, 9.5, 'gift');
             CREATE TABLE orders_backup (id INTEGER);",
        )
        .unwrap();

        let result = synchronize(&conn, &orders(), true, 10).unwrap();
        assert_eq!(result, SyncSchemaResult::OldColumnsRemoved);

        // The pre-existing backup table is untouched and the rebuilt one
        // took the next free name before being renamed into place.
        assert!(table_exists(&conn, "orders_backup").unwrap());
        assert!(!table_exists(&conn, "orders_backup1").unwrap());

        let names: Vec<String> = table_info(&conn, "orders")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["id", "total"]);

        let total: f64 = conn
            .query_row("SELECT total FROM orders WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 9.5);
    }

    #[test]
    fn test_add_column_with_primary_key_surfaces_driver_error() {
        let conn = conn();
        conn.execute_batch("CREATE TABLE orders (total REAL)").unwrap();
        let table = Table::new("orders")
            .column(Column::new("id", |o: &Order| &o.id, |o: &mut Order| &mut o.id).primary_key())
            .column(Column::new("total", |o: &Order| &o.total, |o: &mut Order| &mut o.total));
        let err = synchronize(&conn, &table, false, 10).unwrap_err();
        assert!(matches!(err, StorageError::Driver { .. }));
    }
}
