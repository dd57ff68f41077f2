//! Storage configuration.
//!
//! [`StorageConfig`] is the YAML-serializable description of how a
//! [`Storage`](crate::Storage) opens its connection and how schema
//! synchronization behaves by default.
//!
//! # Example YAML
//!
//! ```yaml
//! path: data/app.db
//! preserve_extra_columns: true
//! max_backup_probes: 1000
//! foreign_keys: true
//! busy_timeout_ms: 5000
//! ```
//!
//! Every key is optional; an empty document yields an in-memory database
//! with the defaults below.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default bound on backup table name probes.
pub const DEFAULT_MAX_BACKUP_PROBES: usize = 1000;

/// Connection and synchronization settings.
///
/// # Examples
///
/// ```
/// use tablemap_sqlite::StorageConfig;
///
/// let config: StorageConfig = serde_yaml::from_str("preserve_extra_columns: true").unwrap();
/// assert!(config.path.is_none());
/// assert!(config.preserve_extra_columns);
/// assert_eq!(config.max_backup_probes, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// Whether [`Storage::sync_schema_default`](crate::Storage::sync_schema_default)
    /// keeps data when live tables carry undeclared columns.
    pub preserve_extra_columns: bool,
    /// How many backup table names are tried before giving up.
    pub max_backup_probes: usize,
    /// Issue `PRAGMA foreign_keys = ON` after opening.
    pub foreign_keys: bool,
    /// Busy handler timeout in milliseconds; `None` keeps the engine default.
    pub busy_timeout_ms: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            preserve_extra_columns: false,
            max_backup_probes: DEFAULT_MAX_BACKUP_PROBES,
            foreign_keys: false,
            busy_timeout_ms: None,
        }
    }
}

impl StorageConfig {
    /// Configuration for a file-backed database with default settings.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::StorageError::Io) if the file cannot be read,
    /// or [`Yaml`](crate::StorageError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::StorageError::Io) if the file cannot be
    /// written, or [`Yaml`](crate::StorageError::Yaml) if serialization
    /// fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// The busy timeout as a [`Duration`].
    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout_ms.map(Duration::from_millis)
    }
}
