//! Descriptor validation.
//!
//! Table and column names are spliced into generated SQL unquoted (or in
//! single quotes), so they are restricted to plain identifiers that are not
//! SQLite keywords. Tables must also have unique column names and at most
//! one column-level primary key.
//!
//! # Examples
//!
//! ```
//! use tablemap_core::{MappingError, validate_identifier};
//!
//! assert!(validate_identifier("users").is_ok());
//! assert!(validate_identifier("_backup1").is_ok());
//! assert!(validate_identifier("group").is_err());
//! assert!(matches!(
//!     validate_identifier("drop;--"),
//!     Err(MappingError::InvalidIdentifier(_))
//! ));
//! ```

use std::collections::HashSet;

use crate::error::{MappingError, Result};
use crate::table::AnyTable;

/// SQLite keywords, sorted for binary search.
const SQLITE_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN",
    "WHERE", "WINDOW", "WITH", "WITHOUT",
];

/// Returns true if `name` is a SQLite keyword, ignoring ASCII case.
pub fn is_keyword(name: &str) -> bool {
    SQLITE_KEYWORDS
        .binary_search(&name.to_ascii_uppercase().as_str())
        .is_ok()
}

/// Checks that `name` is a plain SQL identifier.
///
/// # Errors
///
/// Returns [`MappingError::InvalidIdentifier`] if the name is empty, starts
/// with a digit, contains anything other than ASCII alphanumerics and
/// underscores, or is a SQLite keyword.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid && !is_keyword(name) {
        Ok(())
    } else {
        Err(MappingError::InvalidIdentifier(name.to_string()))
    }
}

/// Checks the structural invariants of a table descriptor.
///
/// # Errors
///
/// Returns [`MappingError::InvalidIdentifier`] for a bad table or column
/// name and [`MappingError::InvalidTable`] for an empty column list,
/// duplicate column names, or more than one primary-key column.
pub fn validate_table(table: &dyn AnyTable) -> Result<()> {
    let invalid = |reason: String| MappingError::InvalidTable {
        table: table.name().to_string(),
        reason,
    };

    validate_identifier(table.name())?;

    let info = table.table_info();
    if info.is_empty() {
        return Err(invalid("no columns declared".to_string()));
    }

    let mut seen = HashSet::new();
    for column in &info {
        validate_identifier(&column.name)?;
        if !seen.insert(column.name.as_str()) {
            return Err(invalid(format!("duplicate column '{}'", column.name)));
        }
    }

    let keys = info.iter().filter(|c| c.is_primary_key()).count();
    if keys > 1 {
        return Err(invalid(format!(
            "{keys} columns declare PRIMARY KEY, at most one is allowed"
        )));
    }

    Ok(())
}

/// Validates every table and checks that no two share a name or a record
/// type.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_tables(tables: &[Box<dyn AnyTable>]) -> Result<()> {
    let mut names = HashSet::new();
    let mut records = HashSet::new();
    for table in tables {
        validate_table(table.as_ref())?;
        if !names.insert(table.name()) {
            return Err(MappingError::InvalidTable {
                table: table.name().to_string(),
                reason: "table declared twice".to_string(),
            });
        }
        if !records.insert(table.record_type()) {
            return Err(MappingError::InvalidTable {
                table: table.name().to_string(),
                reason: format!("record type {} is already mapped", table.record_name()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::table::Table;

    #[derive(Default)]
    struct Pair {
        a: i64,
        b: i64,
    }

    #[derive(Default)]
    struct Other {
        a: i64,
    }

    fn a() -> Column<Pair> {
        Column::new("a", |p: &Pair| &p.a, |p: &mut Pair| &mut p.a)
    }

    fn b() -> Column<Pair> {
        Column::new("b", |p: &Pair| &p.b, |p: &mut Pair| &mut p.b)
    }

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("min_test").is_ok());
        assert!(validate_identifier("T1").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1st").is_err());
        assert!(validate_identifier("hello world").is_err());
        assert!(validate_identifier("name'--").is_err());
        assert!(validate_identifier("naïve").is_err());
    }

    #[test]
    fn test_keywords_rejected() {
        for name in ["group", "ORDER", "Select", "key", "values", "current_date"] {
            assert!(
                matches!(validate_identifier(name), Err(MappingError::InvalidIdentifier(_))),
                "{name}"
            );
        }
        assert!(validate_identifier("groups_").is_ok());
        assert!(validate_identifier("orders").is_ok());
        assert!(validate_identifier("value").is_ok());
    }

    #[test]
    fn test_keywords_sorted() {
        assert!(SQLITE_KEYWORDS.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(SQLITE_KEYWORDS.len(), 147);
    }

    #[test]
    fn test_keyword_column_rejected() {
        let table = Table::new("pairs")
            .column(a())
            .column(Column::new("order", |p: &Pair| &p.b, |p: &mut Pair| &mut p.b));
        assert!(matches!(
            validate_table(&table),
            Err(MappingError::InvalidIdentifier(name)) if name == "order"
        ));
    }

    #[test]
    fn test_valid_table() {
        let table = Table::new("pairs").column(a().primary_key()).column(b());
        assert!(validate_table(&table).is_ok());
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let table = Table::new("pairs")
            .column(a())
            .column(Column::new("a", |p: &Pair| &p.b, |p: &mut Pair| &mut p.b));
        let err = validate_table(&table).unwrap_err();
        assert!(matches!(err, MappingError::InvalidTable { .. }));
    }

    #[test]
    fn test_two_primary_keys_rejected() {
        let table = Table::new("pairs")
            .column(a().primary_key())
            .column(b().primary_key());
        assert!(validate_table(&table).is_err());
    }

    #[test]
    fn test_empty_table_rejected() {
        let table: Table<Pair> = Table::new("pairs");
        assert!(validate_table(&table).is_err());
    }

    #[test]
    fn test_duplicate_record_type_rejected() {
        let tables: Vec<Box<dyn AnyTable>> = vec![
            Box::new(Table::new("pairs_a").column(a())),
            Box::new(Table::new("pairs_b").column(b())),
        ];
        assert!(validate_tables(&tables).is_err());

        let tables: Vec<Box<dyn AnyTable>> = vec![
            Box::new(Table::new("pairs").column(a())),
            Box::new(
                Table::new("extras")
                    .column(Column::new("a", |o: &Other| &o.a, |o: &mut Other| &mut o.a)),
            ),
        ];
        assert!(validate_tables(&tables).is_ok());
    }
}
