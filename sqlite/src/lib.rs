//! SQLite storage backend for tablemap.
//!
//! This crate executes the mappings declared with `tablemap-core` against a
//! SQLite database through `rusqlite`. It keeps the live schema in line with
//! the declared tables and runs typed record and aggregate queries.
//!
//! # Architecture
//!
//! - **`storage`** is the composition root: one connection plus the managed
//!   table descriptors, exposing sync, CRUD and aggregate operations.
//! - **`sync`** reads `PRAGMA table_info` and executes the action chosen by
//!   the schema diff (create, add columns, backup rebuild, recreate).
//! - **`statement`** is a per-call prepared statement guard implementing the
//!   binder/row protocol over rusqlite.
//! - **`config`** holds the YAML-loadable [`StorageConfig`].
//!
//! # Quick start
//!
//! ```no_run
//! use tablemap_core::{AnyTable, Column, Table, field};
//! use tablemap_sqlite::{Storage, StorageConfig};
//!
//! #[derive(Default)]
//! struct Visit {
//!     id: i64,
//!     user_id: i64,
//!     duration: f64,
//! }
//!
//! let visits = Table::new("visits")
//!     .column(Column::new("id", |v: &Visit| &v.id, |v: &mut Visit| &mut v.id).primary_key())
//!     .column(Column::new("user_id", |v: &Visit| &v.user_id, |v: &mut Visit| &mut v.user_id).not_null().default_value("0"))
//!     .column(Column::new("duration", |v: &Visit| &v.duration, |v: &mut Visit| &mut v.duration));
//! let tables: Vec<Box<dyn AnyTable>> = vec![Box::new(visits)];
//!
//! let config = StorageConfig::load("storage.yml").unwrap();
//! let storage = Storage::from_config(config, tables).unwrap();
//! for (table, result) in storage.sync_schema_default().unwrap() {
//!     println!("{table}: {result}");
//! }
//!
//! let longest = storage.max(field(|v: &Visit| &v.duration), None).unwrap();
//! println!("longest visit: {longest:?}");
//! ```
//!
//! # Synchronization is not transactional
//!
//! Each schema statement commits on its own. Wrap
//! [`Storage::sync_schema`] in [`Storage::transaction`] to make a pass
//! all-or-nothing.

mod config;
mod error;
mod statement;
mod storage;
mod sync;

pub use config::{DEFAULT_MAX_BACKUP_PROBES, StorageConfig};
pub use error::{Result, StorageError};
pub use storage::Storage;
