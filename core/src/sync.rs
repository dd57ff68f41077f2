//! Schema comparison.
//!
//! [`diff_columns`] compares the declared columns of a table against the
//! live `PRAGMA table_info` rows and [`SchemaDiff::classify`] turns the
//! difference into the action the synchronizer must take. Both are pure so
//! the decision table can be tested without a database.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::column::TableInfo;

/// Outcome of synchronizing one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSchemaResult {
    /// The table did not exist and was created.
    NewTableCreated,
    /// Live and declared columns already agree.
    AlreadyInSync,
    /// Columns were appended in place.
    NewColumnsAdded,
    /// Extra live columns were removed; surviving data was kept.
    OldColumnsRemoved,
    /// Columns were appended and extra columns removed.
    NewColumnsAddedAndOldColumnsRemoved,
    /// The table was dropped and recreated; its rows are gone.
    DroppedAndRecreated,
}

impl SyncSchemaResult {
    /// Whether the action discards stored rows.
    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::DroppedAndRecreated)
    }

    /// Stable snake_case label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewTableCreated => "new_table_created",
            Self::AlreadyInSync => "already_in_sync",
            Self::NewColumnsAdded => "new_columns_added",
            Self::OldColumnsRemoved => "old_columns_removed",
            Self::NewColumnsAddedAndOldColumnsRemoved => "new_columns_added_and_old_columns_removed",
            Self::DroppedAndRecreated => "dropped_and_recreated",
        }
    }
}

impl fmt::Display for SyncSchemaResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difference between declared and live columns, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Declared columns absent from the live table, in declaration order.
    pub columns_to_add: Vec<TableInfo>,
    /// Live columns absent from the declaration, in live order.
    pub extra_columns: Vec<TableInfo>,
    /// Names of columns present on both sides whose `NOT NULL`, default
    /// presence or primary-key flag differ.
    pub mismatched: Vec<String>,
}

/// Planned action for one existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Nothing to do.
    Keep,
    /// Append the missing columns with `ALTER TABLE .. ADD COLUMN`.
    AddColumns,
    /// Rebuild through a backup table, keeping shared columns.
    Rebuild,
    /// Drop and recreate the table.
    Recreate,
}

/// Compares declared columns against live ones.
///
/// Attribute comparison is limited to what survives a round trip through
/// `PRAGMA table_info`: `NOT NULL`, whether a default exists, and
/// primary-key membership. Declared type text is not compared.
pub fn diff_columns(declared: &[TableInfo], live: &[TableInfo]) -> SchemaDiff {
    let live_by_name: HashMap<&str, &TableInfo> =
        live.iter().map(|c| (c.name.as_str(), c)).collect();
    let declared_names: HashSet<&str> = declared.iter().map(|c| c.name.as_str()).collect();

    let mut diff = SchemaDiff::default();
    for column in declared {
        match live_by_name.get(column.name.as_str()) {
            Some(existing) => {
                if existing.not_null != column.not_null
                    || existing.has_default() != column.has_default()
                    || existing.is_primary_key() != column.is_primary_key()
                {
                    diff.mismatched.push(column.name.clone());
                }
            }
            None => diff.columns_to_add.push(column.clone()),
        }
    }
    diff.extra_columns = live
        .iter()
        .filter(|c| !declared_names.contains(c.name.as_str()))
        .cloned()
        .collect();
    diff
}

impl SchemaDiff {
    /// Whether both sides agree.
    pub fn is_empty(&self) -> bool {
        self.columns_to_add.is_empty() && self.extra_columns.is_empty() && self.mismatched.is_empty()
    }

    /// Decides what to do with the table and which result to report.
    ///
    /// Attribute mismatches always force a recreate, as do extra columns
    /// when `preserve` is off and new `NOT NULL` columns without a default
    /// (which cannot be appended to a populated table).
    pub fn classify(&self, preserve: bool) -> (SyncAction, SyncSchemaResult) {
        let has_extra = !self.extra_columns.is_empty();
        let unaddable = self
            .columns_to_add
            .iter()
            .any(|c| c.not_null && !c.has_default());

        if !self.mismatched.is_empty() || unaddable || (has_extra && !preserve) {
            return (SyncAction::Recreate, SyncSchemaResult::DroppedAndRecreated);
        }

        match (self.columns_to_add.is_empty(), has_extra) {
            (true, false) => (SyncAction::Keep, SyncSchemaResult::AlreadyInSync),
            (false, false) => (SyncAction::AddColumns, SyncSchemaResult::NewColumnsAdded),
            (true, true) => (SyncAction::Rebuild, SyncSchemaResult::OldColumnsRemoved),
            (false, true) => (
                SyncAction::Rebuild,
                SyncSchemaResult::NewColumnsAddedAndOldColumnsRemoved,
            ),
        }
    }
}
