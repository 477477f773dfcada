//! redb storage engine implementation.
//!
//! This module provides the document store backend for ModelDB using
//! [redb](https://docs.rs/redb), a pure Rust embedded key-value store.
//!
//! # Features
//!
//! - ACID transactions with MVCC
//! - Single-writer, multiple-reader concurrency
//! - Automatic crash recovery
//!
//! # File Layout
//!
//! One redb file holds every logical database. Each model table is a redb
//! table named `"{db}.{table}"`, and each secondary index a multimap table
//! named `"{db}.{table}#{field}"` (see [`schema`](super::schema)).

use std::path::{Path, PathBuf};

use ::redb::{
    Database, Durability, ReadableMultimapTable, ReadableTable, ReadableTableMetadata,
    WriteTransaction,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::schema::{
    documents_table, encode_key, index_name, index_table, table_name, DatabaseEntry,
    DatabaseMetadata, TableSpec, DATABASES_TABLE, METADATA_TABLE, SCHEMA_VERSION, TABLES_TABLE,
};
use super::{Document, DocumentStore};
use crate::config::ConnectionOptions;
use crate::error::{ModelDBError, NotFoundError, Result, StorageError};
use crate::types::Timestamp;

/// Metadata key in the metadata table.
const METADATA_KEY: &str = "db_metadata";

/// redb document store.
///
/// # Thread Safety
///
/// `RedbStore` is `Send + Sync`. redb handles internal synchronization
/// using MVCC for readers and exclusive locking for writers.
#[derive(Debug)]
pub struct RedbStore {
    /// The redb database handle.
    db: Database,

    /// Cached database metadata.
    metadata: DatabaseMetadata,

    /// Path to the database file.
    path: PathBuf,

    /// Durability applied to every write transaction.
    durability: Durability,
}

impl RedbStore {
    /// Opens or creates a store at the given path.
    ///
    /// If the file doesn't exist, it will be created and initialized. If it
    /// exists, its metadata is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database file is corrupted
    /// - The database is locked by another process
    /// - Schema version doesn't match
    #[instrument(skip(options), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, options: &ConnectionOptions) -> Result<Self> {
        let path = path.as_ref();
        let db_exists = path.exists();

        debug!(db_exists = db_exists, "Opening storage engine");

        let db = Self::create_database(path, options)?;
        let durability = options.sync_mode.durability();

        if db_exists {
            Self::open_existing(db, path.to_path_buf(), durability)
        } else {
            Self::initialize_new(db, path.to_path_buf(), durability)
        }
    }

    fn create_database(path: &Path, options: &ConnectionOptions) -> Result<Database> {
        let mut builder = Database::builder();
        builder.set_cache_size(options.cache_size_mb * 1024 * 1024);

        // redb reports a second open of the same file as DatabaseAlreadyOpen;
        // lock conflicts with other processes only show up in the message.
        let db = builder.create(path).map_err(|e| {
            if matches!(e, ::redb::DatabaseError::DatabaseAlreadyOpen)
                || e.to_string().contains("locked")
            {
                StorageError::DatabaseLocked
            } else {
                StorageError::Redb(e.to_string())
            }
        })?;

        debug!("Database file opened successfully");
        Ok(db)
    }

    #[instrument(skip(db, durability), fields(path = %path.display()))]
    fn initialize_new(db: Database, path: PathBuf, durability: Durability) -> Result<Self> {
        info!("Initializing new database");

        let metadata = DatabaseMetadata::new();

        let mut write_txn = db.begin_write().map_err(StorageError::from)?;
        write_txn.set_durability(durability);
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes = bincode::serialize(&metadata)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;

            let _ = write_txn.open_table(DATABASES_TABLE)?;
            let _ = write_txn.open_table(TABLES_TABLE)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(schema_version = SCHEMA_VERSION, "Database initialized");

        Ok(Self {
            db,
            metadata,
            path,
            durability,
        })
    }

    #[instrument(skip(db, durability), fields(path = %path.display()))]
    fn open_existing(db: Database, path: PathBuf, durability: Durability) -> Result<Self> {
        info!("Opening existing database");

        let read_txn = db.begin_read().map_err(StorageError::from)?;

        let metadata = {
            let meta_table = read_txn.open_table(METADATA_TABLE).map_err(|e| {
                StorageError::corrupted(format!("Cannot open metadata table: {}", e))
            })?;

            let metadata_bytes = meta_table
                .get(METADATA_KEY)
                .map_err(StorageError::from)?
                .ok_or_else(|| StorageError::corrupted("Missing database metadata"))?;

            bincode::deserialize::<DatabaseMetadata>(metadata_bytes.value())
                .map_err(|e| StorageError::corrupted(format!("Invalid metadata format: {}", e)))?
        };

        drop(read_txn);

        if !metadata.is_compatible() {
            warn!(
                expected = SCHEMA_VERSION,
                found = metadata.schema_version,
                "Schema version mismatch"
            );
            return Err(ModelDBError::Storage(StorageError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: metadata.schema_version,
            }));
        }

        let mut metadata = metadata;
        metadata.touch();

        let mut write_txn = db.begin_write().map_err(StorageError::from)?;
        write_txn.set_durability(durability);
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes = bincode::serialize(&metadata)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;

            // Files written before the catalog existed still open.
            let _ = write_txn.open_table(DATABASES_TABLE)?;
            let _ = write_txn.open_table(TABLES_TABLE)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = metadata.schema_version,
            "Database opened successfully"
        );

        Ok(Self {
            db,
            metadata,
            path,
            durability,
        })
    }

    /// Returns a reference to the underlying redb database.
    #[cfg(test)]
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }

    fn begin_write(&self) -> Result<WriteTransaction> {
        let mut write_txn = self.db.begin_write().map_err(StorageError::from)?;
        write_txn.set_durability(self.durability);
        Ok(write_txn)
    }
}

// ============================================================================
// Transaction helpers
// ============================================================================

fn read_spec<T>(tables: &T, qualified: &str) -> Result<Option<TableSpec>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match tables.get(qualified)? {
        Some(bytes) => Ok(Some(bincode::deserialize(bytes.value())?)),
        None => Ok(None),
    }
}

fn require_spec<T>(tables: &T, qualified: &str) -> Result<TableSpec>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    read_spec(tables, qualified)?
        .ok_or_else(|| StorageError::TableNotFound(qualified.to_string()).into())
}

fn decode(bytes: &[u8]) -> Result<Document> {
    Ok(serde_json::from_slice(bytes)?)
}

fn add_index_entries(
    txn: &WriteTransaction,
    db: &str,
    spec: &TableSpec,
    doc_key: &str,
    document: &Document,
) -> Result<()> {
    for field in &spec.indexes {
        if let Some(value) = document.get(field) {
            let name = index_name(db, &spec.name, field);
            let mut index = txn.open_multimap_table(index_table(&name))?;
            index.insert(encode_key(value).as_str(), doc_key)?;
        }
    }
    Ok(())
}

fn remove_index_entries(
    txn: &WriteTransaction,
    db: &str,
    spec: &TableSpec,
    doc_key: &str,
    document: &Document,
) -> Result<()> {
    for field in &spec.indexes {
        if let Some(value) = document.get(field) {
            let name = index_name(db, &spec.name, field);
            let mut index = txn.open_multimap_table(index_table(&name))?;
            index.remove(encode_key(value).as_str(), doc_key)?;
        }
    }
    Ok(())
}

impl DocumentStore for RedbStore {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    fn list_databases(&self) -> Result<Vec<String>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(DATABASES_TABLE)?;

        let mut names = Vec::new();
        for result in table.iter()? {
            let (name, _) = result.map_err(StorageError::from)?;
            names.push(name.value().to_string());
        }
        Ok(names)
    }

    fn create_database(&self, db: &str) -> Result<bool> {
        let write_txn = self.begin_write()?;
        let created = {
            let mut table = write_txn.open_table(DATABASES_TABLE)?;
            if table.get(db)?.is_some() {
                false
            } else {
                let entry = DatabaseEntry {
                    created_at: Timestamp::now(),
                };
                table.insert(db, bincode::serialize(&entry)?.as_slice())?;
                true
            }
        };
        write_txn.commit().map_err(StorageError::from)?;

        if created {
            info!(db = db, "Database created");
        }
        Ok(created)
    }

    fn list_tables(&self, db: &str) -> Result<Vec<String>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        if read_txn.open_table(DATABASES_TABLE)?.get(db)?.is_none() {
            return Err(NotFoundError::database(db).into());
        }

        let prefix = format!("{}.", db);
        let table = read_txn.open_table(TABLES_TABLE)?;

        let mut names = Vec::new();
        for result in table.iter()? {
            let (name, _) = result.map_err(StorageError::from)?;
            if let Some(table_name) = name.value().strip_prefix(prefix.as_str()) {
                names.push(table_name.to_string());
            }
        }
        Ok(names)
    }

    fn table_spec(&self, db: &str, table: &str) -> Result<Option<TableSpec>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let tables = read_txn.open_table(TABLES_TABLE)?;
        read_spec(&tables, &table_name(db, table))
    }

    #[instrument(skip(self, spec), fields(table = %spec.name))]
    fn create_table(&self, db: &str, spec: &TableSpec) -> Result<bool> {
        let qualified = table_name(db, &spec.name);

        let write_txn = self.begin_write()?;
        let created = {
            if write_txn.open_table(DATABASES_TABLE)?.get(db)?.is_none() {
                return Err(NotFoundError::database(db).into());
            }

            let mut tables = write_txn.open_table(TABLES_TABLE)?;
            let docs = write_txn.open_table(documents_table(&qualified))?;

            match read_spec(&tables, &qualified)? {
                None => {
                    for field in &spec.indexes {
                        let name = index_name(db, &spec.name, field);
                        write_txn.open_multimap_table(index_table(&name))?;
                    }
                    tables.insert(qualified.as_str(), bincode::serialize(spec)?.as_slice())?;
                    true
                }
                Some(mut current) => {
                    if current.primary_key != spec.primary_key {
                        warn!(
                            stored = %current.primary_key,
                            requested = %spec.primary_key,
                            "Primary key mismatch on existing table, keeping stored key"
                        );
                    }

                    let missing: Vec<String> = spec
                        .indexes
                        .iter()
                        .filter(|field| !current.has_index(field))
                        .cloned()
                        .collect();

                    if !missing.is_empty() {
                        let backfill = TableSpec {
                            indexes: missing.clone(),
                            ..current.clone()
                        };
                        for field in &backfill.indexes {
                            let name = index_name(db, &backfill.name, field);
                            write_txn.open_multimap_table(index_table(&name))?;
                        }
                        for result in docs.iter()? {
                            let (key, bytes) = result.map_err(StorageError::from)?;
                            let document = decode(bytes.value())?;
                            add_index_entries(&write_txn, db, &backfill, key.value(), &document)?;
                        }

                        debug!(indexes = ?missing, "Indexes added to existing table");
                        current.indexes.extend(missing);
                        tables.insert(qualified.as_str(), bincode::serialize(&current)?.as_slice())?;
                    }
                    false
                }
            }
        };
        write_txn.commit().map_err(StorageError::from)?;

        if created {
            info!(db = db, indexes = spec.indexes.len(), "Table created");
        }
        Ok(created)
    }

    #[instrument(skip(self))]
    fn drop_table(&self, db: &str, table: &str) -> Result<bool> {
        let qualified = table_name(db, table);

        let write_txn = self.begin_write()?;
        let existed = {
            let mut tables = write_txn.open_table(TABLES_TABLE)?;
            match read_spec(&tables, &qualified)? {
                None => false,
                Some(spec) => {
                    tables.remove(qualified.as_str())?;
                    write_txn.delete_table(documents_table(&qualified))?;
                    for field in &spec.indexes {
                        let name = index_name(db, table, field);
                        write_txn.delete_multimap_table(index_table(&name))?;
                    }
                    true
                }
            }
        };
        write_txn.commit().map_err(StorageError::from)?;

        if existed {
            info!(db = db, table = table, "Table dropped");
        }
        Ok(existed)
    }

    // =========================================================================
    // Documents
    // =========================================================================

    fn insert(&self, db: &str, table: &str, key: &Value, document: &Document) -> Result<()> {
        let qualified = table_name(db, table);
        let doc_key = encode_key(key);
        let bytes = serde_json::to_vec(document)?;

        let write_txn = self.begin_write()?;
        {
            let spec = require_spec(&write_txn.open_table(TABLES_TABLE)?, &qualified)?;
            let mut docs = write_txn.open_table(documents_table(&qualified))?;

            if docs.get(doc_key.as_str())?.is_some() {
                return Err(StorageError::DuplicateKey {
                    table: qualified,
                    key: doc_key,
                }
                .into());
            }

            docs.insert(doc_key.as_str(), bytes.as_slice())?;
            add_index_entries(&write_txn, db, &spec, &doc_key, document)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        debug!(table = %qualified, key = %doc_key, "Document inserted");
        Ok(())
    }

    fn get(&self, db: &str, table: &str, key: &Value) -> Result<Option<Document>> {
        let qualified = table_name(db, table);
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        require_spec(&read_txn.open_table(TABLES_TABLE)?, &qualified)?;

        let docs = read_txn.open_table(documents_table(&qualified))?;
        let result = match docs.get(encode_key(key).as_str())? {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        };
        result
    }

    fn update(&self, db: &str, table: &str, key: &Value, patch: &Document) -> Result<bool> {
        let qualified = table_name(db, table);
        let doc_key = encode_key(key);

        let write_txn = self.begin_write()?;
        let existed = {
            let spec = require_spec(&write_txn.open_table(TABLES_TABLE)?, &qualified)?;
            let mut docs = write_txn.open_table(documents_table(&qualified))?;

            let current = docs
                .get(doc_key.as_str())?
                .map(|bytes| bytes.value().to_vec());

            match current {
                None => false,
                Some(bytes) => {
                    let previous = decode(&bytes)?;
                    let mut merged = previous.clone();
                    for (field, value) in patch {
                        merged.insert(field.clone(), value.clone());
                    }

                    docs.insert(doc_key.as_str(), serde_json::to_vec(&merged)?.as_slice())?;
                    remove_index_entries(&write_txn, db, &spec, &doc_key, &previous)?;
                    add_index_entries(&write_txn, db, &spec, &doc_key, &merged)?;
                    true
                }
            }
        };
        write_txn.commit().map_err(StorageError::from)?;

        debug!(table = %qualified, key = %doc_key, existed, "Document updated");
        Ok(existed)
    }

    fn delete(&self, db: &str, table: &str, key: &Value) -> Result<bool> {
        let qualified = table_name(db, table);
        let doc_key = encode_key(key);

        let write_txn = self.begin_write()?;
        let existed = {
            let spec = require_spec(&write_txn.open_table(TABLES_TABLE)?, &qualified)?;
            let mut docs = write_txn.open_table(documents_table(&qualified))?;

            let removed = docs
                .remove(doc_key.as_str())?
                .map(|bytes| bytes.value().to_vec());

            match removed {
                None => false,
                Some(bytes) => {
                    remove_index_entries(&write_txn, db, &spec, &doc_key, &decode(&bytes)?)?;
                    true
                }
            }
        };
        write_txn.commit().map_err(StorageError::from)?;

        if existed {
            debug!(table = %qualified, key = %doc_key, "Document deleted");
        }
        Ok(existed)
    }

    fn count(&self, db: &str, table: &str) -> Result<u64> {
        let qualified = table_name(db, table);
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        require_spec(&read_txn.open_table(TABLES_TABLE)?, &qualified)?;

        let docs = read_txn.open_table(documents_table(&qualified))?;
        Ok(docs.len()?)
    }

    fn find_by_index(
        &self,
        db: &str,
        table: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        let qualified = table_name(db, table);
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;

        let spec = require_spec(&read_txn.open_table(TABLES_TABLE)?, &qualified)?;
        if !spec.has_index(field) {
            return Err(StorageError::IndexNotFound {
                table: qualified,
                field: field.to_string(),
            }
            .into());
        }

        let index = read_txn.open_multimap_table(index_table(&index_name(db, table, field)))?;
        let docs = read_txn.open_table(documents_table(&qualified))?;

        let mut documents = Vec::new();
        for entry in index.get(encode_key(value).as_str())? {
            let doc_key = entry.map_err(StorageError::from)?;
            if let Some(bytes) = docs.get(doc_key.value())? {
                documents.push(decode(bytes.value())?);
            }
        }

        debug!(table = %qualified, field = field, found = documents.len(), "Index lookup");
        Ok(documents)
    }
}

// RedbStore is auto Send + Sync: Database, DatabaseMetadata, PathBuf and
// Durability are all Send + Sync.
