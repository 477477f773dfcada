//! Storage layer abstractions for ModelDB.
//!
//! This module provides a trait-based abstraction over the document store,
//! so the persistence adapter does not depend on one engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Collection                              │
//! │                         │                                    │
//! │                         ▼                                    │
//! │              ┌─────────────────────┐                        │
//! │              │   DocumentStore     │  ← Trait               │
//! │              └─────────────────────┘                        │
//! │                         ▲                                    │
//! │                         │                                    │
//! │                   ┌─────┴─────┐                              │
//! │                   │ RedbStore │                              │
//! │                   └───────────┘                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Documents are JSON objects. Every table is addressed by a logical
//! database name plus a table name, and every document by the value of the
//! table's primary-key field.

pub mod redb;
pub mod schema;

pub use self::redb::RedbStore;
pub use schema::{DatabaseMetadata, TableSpec, SCHEMA_VERSION};

use std::path::Path;

use serde_json::{Map, Value};

use crate::config::ConnectionOptions;
use crate::error::Result;

/// A JSON document as stored.
pub type Document = Map<String, Value>;

/// Document store contract.
///
/// All methods are blocking; async callers run them on a blocking thread.
/// Each write method runs in its own transaction.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one store can be shared by
/// every collection using the same connection.
pub trait DocumentStore: Send + Sync {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Returns the database metadata.
    fn metadata(&self) -> &DatabaseMetadata;

    /// Returns the path to the database file, if applicable.
    fn path(&self) -> Option<&Path>;

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Lists logical database names.
    fn list_databases(&self) -> Result<Vec<String>>;

    /// Creates a logical database. Returns `false` if it already existed.
    fn create_database(&self, db: &str) -> Result<bool>;

    /// Lists the table names of a logical database.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the database does not exist.
    fn list_tables(&self, db: &str) -> Result<Vec<String>>;

    /// Returns the catalog entry of a table.
    fn table_spec(&self, db: &str, table: &str) -> Result<Option<TableSpec>>;

    /// Creates a table, or adds missing indexes to an existing one.
    ///
    /// Returns `false` if the table already existed. New indexes on an
    /// existing table are filled from the documents already stored. The
    /// primary key of an existing table never changes.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the database does not exist.
    fn create_table(&self, db: &str, spec: &TableSpec) -> Result<bool>;

    /// Drops a table and its indexes. Returns `false` if it did not exist.
    fn drop_table(&self, db: &str, table: &str) -> Result<bool>;

    // =========================================================================
    // Documents
    // =========================================================================

    /// Inserts a document under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateKey`](crate::StorageError::DuplicateKey)
    /// if a document with the same key exists, or `TableNotFound`.
    fn insert(&self, db: &str, table: &str, key: &Value, document: &Document) -> Result<()>;

    /// Reads a document by key.
    fn get(&self, db: &str, table: &str, key: &Value) -> Result<Option<Document>>;

    /// Merges `patch` into the stored document, top-level keys replacing
    /// existing ones.
    ///
    /// Returns `false` if no document has the key.
    fn update(&self, db: &str, table: &str, key: &Value, patch: &Document) -> Result<bool>;

    /// Deletes a document. Returns `false` if no document has the key.
    fn delete(&self, db: &str, table: &str, key: &Value) -> Result<bool>;

    /// Counts the documents of a table.
    fn count(&self, db: &str, table: &str) -> Result<u64>;

    /// Returns every document whose `field` equals `value`, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::IndexNotFound`](crate::StorageError::IndexNotFound)
    /// if `field` has no index.
    fn find_by_index(&self, db: &str, table: &str, field: &str, value: &Value)
        -> Result<Vec<Document>>;
}

/// Opens the document store described by `options`.
///
/// # Errors
///
/// Returns an error if:
/// - The database file is corrupted
/// - The database is locked by another process
/// - Schema version doesn't match
pub fn open_store(options: &ConnectionOptions) -> Result<Box<dyn DocumentStore>> {
    let store = RedbStore::open(&options.path, options)?;
    Ok(Box::new(store))
}
