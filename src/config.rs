//! Connection configuration for ModelDB.
//!
//! [`ConnectionOptions`] says where documents live and how writes are made
//! durable:
//! - Database file path
//! - Logical database name inside the file
//! - Cache size and durability settings
//!
//! The serialized form of the options is also the identity of a connection:
//! two collections configured with equal options share one open store.
//!
//! # Example
//! ```rust
//! use modeldb::{ConnectionOptions, SyncMode};
//!
//! // Use defaults ("./modeldb.redb", database "test")
//! let options = ConnectionOptions::default();
//!
//! // Customize
//! let options = ConnectionOptions {
//!     db: "accounts".into(),
//!     sync_mode: SyncMode::Fast,
//!     ..Default::default()
//! };
//! assert!(options.validate().is_ok());
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::options_hash;
use crate::error::{ModelDBError, Result};

/// Default logical database name.
pub const DEFAULT_DB: &str = "test";

/// Options used to open a document store.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use modeldb::ConnectionOptions;
///
/// let options = ConnectionOptions {
///     path: "/tmp/app.redb".into(),
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Database file path. Created on first connect.
    pub path: PathBuf,

    /// Logical database holding the model tables.
    pub db: String,

    /// Cache size in megabytes for the storage engine.
    ///
    /// Default: 64 MB
    pub cache_size_mb: usize,

    /// Durability mode for write operations.
    pub sync_mode: SyncMode,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./modeldb.redb"),
            db: DEFAULT_DB.to_string(),
            cache_size_mb: 64,
            sync_mode: SyncMode::Normal,
        }
    }
}

impl ConnectionOptions {
    /// Creates options for the given database file, other settings default.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Sets the logical database name.
    pub fn with_db(mut self, db: impl Into<String>) -> Self {
        self.db = db.into();
        self
    }

    /// Validates the options.
    ///
    /// Called automatically when a connection is opened.
    ///
    /// # Errors
    /// Returns a configuration error if:
    /// - `path` is empty
    /// - `db` is empty or contains `.` or `#` (reserved for table names)
    /// - `cache_size_mb` is 0
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(ModelDBError::config("path must not be empty"));
        }

        if self.db.is_empty() {
            return Err(ModelDBError::config("db must not be empty"));
        }

        if self.db.contains(['.', '#']) {
            return Err(ModelDBError::config(format!(
                "db name {:?} must not contain '.' or '#'",
                self.db
            )));
        }

        if self.cache_size_mb == 0 {
            return Err(ModelDBError::config("cache_size_mb must be greater than 0"));
        }

        Ok(())
    }

    /// Returns the options as a JSON mapping.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Returns the connection identity of these options.
    ///
    /// Equal option mappings always produce the same hash, whatever the
    /// order their keys were written in.
    pub fn hash(&self) -> Result<String> {
        Ok(options_hash(&self.to_value()?))
    }
}

/// Durability mode for write operations.
///
/// Controls the trade-off between write performance and crash safety.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Sync to disk on transaction commit.
    #[default]
    Normal,

    /// Async sync (faster writes, may lose recent data on crash).
    Fast,

    /// Sync every write operation with extra integrity checks.
    Paranoid,
}

impl SyncMode {
    /// Returns true if this mode syncs on every write.
    pub fn is_paranoid(&self) -> bool {
        matches!(self, Self::Paranoid)
    }

    /// Returns true if this mode is async (may lose data on crash).
    pub fn is_fast(&self) -> bool {
        matches!(self, Self::Fast)
    }

    /// Returns the storage engine durability for this mode.
    #[allow(deprecated)]
    pub(crate) fn durability(&self) -> redb::Durability {
        match self {
            Self::Normal => redb::Durability::Immediate,
            Self::Fast => redb::Durability::Eventual,
            Self::Paranoid => redb::Durability::Paranoid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_options() {
        let options = ConnectionOptions::default();
        assert_eq!(options.db, "test");
        assert_eq!(options.cache_size_mb, 64);
        assert_eq!(options.sync_mode, SyncMode::Normal);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_helpers() {
        let options = ConnectionOptions::new("/tmp/x.redb").with_db("accounts");
        assert_eq!(options.path, PathBuf::from("/tmp/x.redb"));
        assert_eq!(options.db, "accounts");
    }

    #[test]
    fn test_validate_empty_path() {
        let options = ConnectionOptions::new("");
        let err = options.validate().unwrap_err();
        assert!(matches!(err, ModelDBError::Config { ref reason } if reason.contains("path")));
    }

    #[test]
    fn test_validate_db_name() {
        assert!(ConnectionOptions::default().with_db("").validate().is_err());
        assert!(ConnectionOptions::default().with_db("a.b").validate().is_err());
        assert!(ConnectionOptions::default().with_db("a#b").validate().is_err());
        assert!(ConnectionOptions::default().with_db("a_b").validate().is_ok());
    }

    #[test]
    fn test_validate_cache_size_zero() {
        let options = ConnectionOptions {
            cache_size_mb: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let options: ConnectionOptions =
            serde_json::from_value(json!({"path": "/tmp/x.redb"})).unwrap();
        assert_eq!(options.db, "test");
        assert_eq!(options.sync_mode, SyncMode::Normal);
    }

    #[test]
    fn test_hash_depends_on_content() {
        let a = ConnectionOptions::new("/tmp/a.redb");
        let b = ConnectionOptions::new("/tmp/a.redb");
        let c = ConnectionOptions::new("/tmp/a.redb").with_db("other");

        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
        assert_ne!(a.hash().unwrap(), c.hash().unwrap());
    }

    #[test]
    fn test_sync_mode_checks() {
        assert!(!SyncMode::Normal.is_fast());
        assert!(!SyncMode::Normal.is_paranoid());
        assert!(SyncMode::Fast.is_fast());
        assert!(SyncMode::Paranoid.is_paranoid());
    }

    #[test]
    #[allow(deprecated)]
    fn test_sync_mode_durability() {
        assert!(matches!(SyncMode::Normal.durability(), redb::Durability::Immediate));
        assert!(matches!(SyncMode::Fast.durability(), redb::Durability::Eventual));
        assert!(matches!(SyncMode::Paranoid.durability(), redb::Durability::Paranoid));
    }
}
