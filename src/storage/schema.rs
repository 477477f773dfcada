//! Database schema definitions and versioning.
//!
//! The fixed tables are compile-time constants. Document and index tables
//! are created per model table, so their definitions are built from names
//! at runtime.
//!
//! # Schema Versioning
//!
//! The schema version is stored in the metadata table. When opening an
//! existing database, we check the version and fail if it doesn't match.
//!
//! # Table Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ METADATA_TABLE                                               │
//! │   Key: &str                                                  │
//! │   Value: &[u8] (bincode)                                     │
//! │   Entries: "db_metadata" -> DatabaseMetadata                 │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ DATABASES_TABLE                                              │
//! │   Key: &str (logical database name)                          │
//! │   Value: &[u8] (bincode-serialized DatabaseEntry)            │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ TABLES_TABLE                                                 │
//! │   Key: &str ("{db}.{table}")                                 │
//! │   Value: &[u8] (bincode-serialized TableSpec)                │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ "{db}.{table}"  (one per model table)                        │
//! │   Key: &str (canonical JSON of the primary key)              │
//! │   Value: &[u8] (JSON document)                               │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ "{db}.{table}#{field}"  (multimap, one per indexed field)    │
//! │   Key: &str (canonical JSON of the field value)              │
//! │   Value: &str (canonical JSON of the primary key)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use redb::{MultimapTableDefinition, TableDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::canonical_json;
use crate::types::Timestamp;

/// Current schema version.
///
/// Increment this when making breaking changes to the schema.
/// The database will refuse to open if versions don't match.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Table Definitions
// ============================================================================

/// Metadata table for database-level information.
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Logical databases.
pub const DATABASES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("databases");

/// Model tables of every logical database, keyed by qualified name.
pub const TABLES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tables");

/// Returns the definition of a document table.
#[inline]
pub fn documents_table(qualified: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(qualified)
}

/// Returns the definition of a secondary index table.
#[inline]
pub fn index_table(qualified: &str) -> MultimapTableDefinition<'_, &'static str, &'static str> {
    MultimapTableDefinition::new(qualified)
}

// ============================================================================
// Naming
// ============================================================================

/// Qualified name of a model table: `"{db}.{table}"`.
#[inline]
pub fn table_name(db: &str, table: &str) -> String {
    format!("{}.{}", db, table)
}

/// Qualified name of an index table: `"{db}.{table}#{field}"`.
#[inline]
pub fn index_name(db: &str, table: &str, field: &str) -> String {
    format!("{}.{}#{}", db, table, field)
}

/// Encodes a primary key or indexed value as a table key.
#[inline]
pub fn encode_key(value: &Value) -> String {
    canonical_json(value)
}

// ============================================================================
// Stored Records
// ============================================================================

/// Database metadata stored in the metadata table.
///
/// This is serialized with bincode and stored under the key "db_metadata".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Schema version for compatibility checking.
    pub schema_version: u32,

    /// Timestamp when the database was created.
    pub created_at: Timestamp,

    /// Last time the database was opened (updated on each open).
    pub last_opened_at: Timestamp,
}

impl DatabaseMetadata {
    /// Creates new metadata for a fresh database.
    pub fn new() -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: now,
            last_opened_at: now,
        }
    }

    /// Updates the last_opened_at timestamp.
    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    /// Checks if this metadata is compatible with the current schema.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

impl Default for DatabaseMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Catalog entry of a logical database.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    /// When the database was created.
    pub created_at: Timestamp,
}

/// Catalog entry of a model table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Unqualified table name.
    pub name: String,

    /// Name of the document field holding the primary key.
    pub primary_key: String,

    /// Fields with a secondary index.
    pub indexes: Vec<String>,

    /// When the table was created.
    pub created_at: Timestamp,
}

impl TableSpec {
    /// Creates a table spec.
    pub fn new(
        name: impl Into<String>,
        primary_key: impl Into<String>,
        indexes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            indexes: indexes.into_iter().map(Into::into).collect(),
            created_at: Timestamp::now(),
        }
    }

    /// Returns true if `field` has a secondary index.
    pub fn has_index(&self, field: &str) -> bool {
        self.indexes.iter().any(|index| index == field)
    }
}
