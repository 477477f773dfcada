//! Async persistence adapter.
//!
//! A [`Collection`] binds a model definition to a table of a document store.
//! It takes what the model exposes (the serialized record, the primary key
//! name, the indexed fields) and turns it into store operations:
//!
//! ```text
//! Collection::create(record)
//!     ├── connect()                    ← cached connection, ensure db/table/indexes once
//!     ├── record.serialize(verify)     ← missing required fields fail here
//!     ├── generate key if unset        ← UUID v7, written back to the record
//!     └── spawn_blocking(store.insert)
//! ```
//!
//! Store calls block, so each one runs on tokio's blocking pool.
//!
//! # Example
//!
//! ```rust,no_run
//! use modeldb::{Collection, ConnectionOptions, Field, ModelDefinition, Record};
//!
//! # async fn run() -> modeldb::Result<()> {
//! let user = ModelDefinition::builder("User")
//!     .field("email", Field::string().required().indexed())
//!     .build()?;
//!
//! let users = Collection::new(&user, ConnectionOptions::new("./app.redb"));
//!
//! let mut record = Record::with(&user, None, [("email", "ada@example.com")])?;
//! let key = users.create(&mut record).await?;
//!
//! let stored = users.read(key).await?;
//! assert!(stored.is_some());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::config::ConnectionOptions;
use crate::connection::{Connection, ConnectionRegistry};
use crate::error::{ModelError, Result, StorageError};
use crate::model::ModelDefinition;
use crate::record::Record;
use crate::storage::{Document, DocumentStore, TableSpec};
use crate::types::DocumentKey;

#[derive(Default)]
struct State {
    connection: Option<Arc<Connection>>,
    ensured: bool,
}

/// A model definition bound to a store table.
pub struct Collection {
    definition: Arc<ModelDefinition>,
    options: ConnectionOptions,
    registry: Arc<ConnectionRegistry>,
    state: Mutex<State>,
}

impl Collection {
    /// Creates a collection using the process-wide connection registry.
    pub fn new(definition: &Arc<ModelDefinition>, options: ConnectionOptions) -> Self {
        Self::with_registry(definition, options, ConnectionRegistry::global())
    }

    /// Creates a collection using a specific connection registry.
    pub fn with_registry(
        definition: &Arc<ModelDefinition>,
        options: ConnectionOptions,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            definition: Arc::clone(definition),
            options,
            registry,
            state: Mutex::new(State::default()),
        }
    }

    /// Returns the model definition.
    #[inline]
    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    /// Returns the connection options.
    #[inline]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Connects and makes sure the database, table and indexes exist.
    ///
    /// The table is provisioned once per connection; a closed connection is
    /// replaced and provisioned again.
    #[instrument(skip(self), fields(model = %self.definition.name()))]
    pub async fn connect(&self) -> Result<Arc<Connection>> {
        let mut state = self.state.lock().await;

        let cached = state
            .connection
            .as_ref()
            .filter(|connection| connection.is_open())
            .map(Arc::clone);

        let connection = match cached {
            Some(connection) => connection,
            None => {
                let connection = self.registry.connect(&self.options).await?;
                state.connection = Some(Arc::clone(&connection));
                state.ensured = false;
                connection
            }
        };

        if !state.ensured {
            let store = connection.store()?;
            let db = self.options.db.clone();
            let spec = TableSpec::new(
                self.definition.table(),
                self.definition.primary().name(),
                self.definition.indexed().map(|field| field.name().to_string()),
            );

            tokio::task::spawn_blocking(move || -> Result<()> {
                store.create_database(&db)?;
                store.create_table(&db, &spec)?;
                Ok(())
            })
            .await??;

            state.ensured = true;
            info!(
                db = %self.options.db,
                table = self.definition.table(),
                "Table ensured"
            );
        }

        Ok(connection)
    }

    /// Stores a new record and returns its primary key.
    ///
    /// Required fields are checked first. When the primary key is unset, a
    /// UUID v7 string is generated and assigned to the record.
    ///
    /// # Errors
    ///
    /// - [`ModelError::MissingFields`] if a required field is unset
    /// - [`StorageError::DuplicateKey`] if the key is taken
    #[instrument(skip(self, record), fields(model = %self.definition.name()))]
    pub async fn create(&self, record: &mut Record) -> Result<Value> {
        let mut document = record.serialize(true)?;
        let primary = self.definition.primary().name().to_string();

        let key = match record.primary_key() {
            Some(key) => key.clone(),
            None => {
                let generated = DocumentKey::new().to_value();
                record.set(&primary, generated.clone())?;
                document.insert(primary, generated.clone());
                generated
            }
        };

        let stored_key = key.clone();
        self.blocking(move |store, db, table| store.insert(db, table, &stored_key, &document))
            .await?;

        debug!(key = %key, "Record created");
        Ok(key)
    }

    /// Reads the record stored under `key`.
    pub async fn read(&self, key: impl Into<Value>) -> Result<Option<Record>> {
        let key = key.into();
        let document = self
            .blocking(move |store, db, table| store.get(db, table, &key))
            .await?;

        document.map(|document| self.rebuild(document)).transpose()
    }

    /// Writes the record's set fields over the stored document.
    ///
    /// Required fields are checked first, as for [`create`](Self::create).
    /// Returns `false` if nothing is stored under the record's key.
    ///
    /// # Errors
    ///
    /// [`ModelError::MissingFields`] naming the primary key if it is unset,
    /// or any unset required field.
    #[instrument(skip(self, record), fields(model = %self.definition.name()))]
    pub async fn update(&self, record: &Record) -> Result<bool> {
        let key = self.require_key(record)?;
        let patch = record.serialize(true)?;

        self.blocking(move |store, db, table| store.update(db, table, &key, &patch))
            .await
    }

    /// Deletes the stored record. Returns `false` if it was not stored.
    #[instrument(skip(self, record), fields(model = %self.definition.name()))]
    pub async fn delete(&self, record: &Record) -> Result<bool> {
        let key = self.require_key(record)?;
        self.blocking(move |store, db, table| store.delete(db, table, &key))
            .await
    }

    /// Returns the number of stored records.
    pub async fn count(&self) -> Result<u64> {
        self.blocking(|store, db, table| store.count(db, table)).await
    }

    /// Returns every stored record whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// - [`ModelError::UnknownField`] if the model has no such field
    /// - [`StorageError::IndexNotFound`] if the field is not indexed
    pub async fn find_by(&self, field: &str, value: impl Into<Value>) -> Result<Vec<Record>> {
        if !self.definition.check_field(field)?.is_indexed() {
            return Err(StorageError::IndexNotFound {
                table: self.definition.table().to_string(),
                field: field.to_string(),
            }
            .into());
        }

        let field = field.to_string();
        let value = value.into();
        let documents = self
            .blocking(move |store, db, table| store.find_by_index(db, table, &field, &value))
            .await?;

        documents
            .into_iter()
            .map(|document| self.rebuild(document))
            .collect()
    }

    /// Drops the table with every stored record.
    ///
    /// The next operation provisions it again.
    #[instrument(skip(self), fields(model = %self.definition.name()))]
    pub async fn drop_table(&self) -> Result<bool> {
        let dropped = self
            .blocking(|store, db, table| store.drop_table(db, table))
            .await?;
        self.state.lock().await.ensured = false;
        Ok(dropped)
    }

    /// Closes this collection's connection, if one is open.
    ///
    /// The connection is shared: other collections using the same options
    /// reconnect on their next operation.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(connection) = state.connection.take() {
            connection.close()?;
        }
        state.ensured = false;
        Ok(())
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DocumentStore, &str, &str) -> Result<T> + Send + 'static,
    {
        let store = self.connect().await?.store()?;
        let db = self.options.db.clone();
        let table = self.definition.table().to_string();

        tokio::task::spawn_blocking(move || op(store.as_ref(), &db, &table)).await?
    }

    fn require_key(&self, record: &Record) -> Result<Value> {
        record.primary_key().cloned().ok_or_else(|| {
            ModelError::MissingFields {
                model: self.definition.name().to_string(),
                fields: vec![self.definition.primary().name().to_string()],
            }
            .into()
        })
    }

    /// Builds a record from a stored document.
    ///
    /// Computed values are produced again on serialization, so only
    /// `computed_empty` fields keep theirs: for them, being set matters.
    fn rebuild(&self, mut document: Document) -> Result<Record> {
        strip_computed(&self.definition, &mut document);
        Record::from_map(&self.definition, document)
    }
}

/// Removes stored computed values, descending into sub-model documents.
fn strip_computed(definition: &ModelDefinition, document: &mut Document) {
    for field in definition.computed() {
        if !field.is_computed_empty() {
            document.remove(field.name());
        }
    }

    for field in definition.nested().chain(definition.related()) {
        if let (Some(sub_model), Some(Value::Object(sub_document))) =
            (field.model_definition(), document.get_mut(field.name()))
        {
            strip_computed(sub_model, sub_document);
        }
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("model", &self.definition.name())
            .field("table", &self.definition.table())
            .field("db", &self.options.db)
            .finish_non_exhaustive()
    }
}
