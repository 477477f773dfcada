//! Error types for ModelDB.
//!
//! ModelDB uses a hierarchical error system:
//! - `ModelDBError` is the top-level error returned by all public APIs
//! - Specific error types (`ModelError`, `StorageError`) provide detail
//!
//! Every [`ModelError`] names the model it was raised for and the offending
//! field names, so a failure deep inside a nested record can still be traced
//! back to its declaration.
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use modeldb::{ModelDefinition, Field, Record, Result};
//!
//! fn example() -> Result<()> {
//!     let user = ModelDefinition::builder("User")
//!         .field("email", Field::string().required())
//!         .build()?;
//!     let record = Record::new(&user)?;
//!     record.serialize(true)?; // fails: email is missing
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for ModelDB operations.
pub type Result<T> = std::result::Result<T, ModelDBError>;

/// Top-level error enum for all ModelDB operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum ModelDBError {
    /// Model definition, assignment or serialization error.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Storage layer error (I/O, corruption, transactions).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// Requested entity not found.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background task running blocking storage work failed.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl ModelDBError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates a runtime error with the given message.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Returns true if this is a model error.
    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model(_))
    }

    /// Returns true if this is a "missing fields" error.
    ///
    /// These are the only model errors that usually originate from
    /// user-supplied data rather than from a programming mistake.
    pub fn is_missing_fields(&self) -> bool {
        matches!(self, Self::Model(ModelError::MissingFields { .. }))
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns the underlying model error, if any.
    pub fn as_model(&self) -> Option<&ModelError> {
        match self {
            Self::Model(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors raised by model definitions and records.
///
/// `Clone` because the outcome of computed-field resolution is cached on the
/// definition and handed out to every record construction.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ModelError {
    /// More than one field was declared with `primary`.
    #[error("Model {model} has multiple primary fields: {fields:?}")]
    MultiplePrimary {
        /// Model name.
        model: String,
        /// Names of every primary field.
        fields: Vec<String>,
    },

    /// The same attribute name was declared twice in one definition.
    #[error("Model {model} declares {name} more than once")]
    DuplicateName {
        /// Model name.
        model: String,
        /// The repeated field or method name.
        name: String,
    },

    /// Computed fields name methods that the model does not have.
    #[error("Model {model} has missing methods: {methods:?}")]
    MissingMethods {
        /// Model name.
        model: String,
        /// Method names that could not be resolved.
        methods: Vec<String>,
    },

    /// Computed fields name attributes that are not callable.
    #[error("Model {model} computed fields must be method names or functions: {fields:?}")]
    InvalidComputed {
        /// Model name.
        model: String,
        /// Names of the computed fields with a non-callable target.
        fields: Vec<String>,
    },

    /// Input referenced fields that the model does not declare.
    #[error("Model {model} has undefined fields: {fields:?}")]
    UndefinedFields {
        /// Model name.
        model: String,
        /// Undeclared keys, in input order.
        fields: Vec<String>,
    },

    /// A single field lookup failed.
    #[error("Model {model} does not have field: {field}")]
    UnknownField {
        /// Model name.
        model: String,
        /// The requested field name.
        field: String,
    },

    /// Required fields are not set.
    #[error("Model {model} has missing fields: {fields:?}")]
    MissingFields {
        /// Model name.
        model: String,
        /// Required fields without a value, in declaration order.
        fields: Vec<String>,
    },

    /// Manual assignment to a `computed_type` field with the wrong runtime type.
    #[error("Model {model} field {field} expects {expected}, got {found}")]
    TypeMismatch {
        /// Model name.
        model: String,
        /// Field name.
        field: String,
        /// Declared type.
        expected: String,
        /// Runtime type of the rejected value.
        found: String,
    },

    /// A value could not be converted to the field's declared type.
    #[error("Model {model} field {field} cannot convert value: {reason}")]
    Conversion {
        /// Model name.
        model: String,
        /// Field name.
        field: String,
        /// Why the conversion failed.
        reason: String,
    },
}

impl ModelError {
    /// Returns the name of the model the error was raised for.
    pub fn model(&self) -> &str {
        match self {
            Self::MultiplePrimary { model, .. }
            | Self::DuplicateName { model, .. }
            | Self::MissingMethods { model, .. }
            | Self::InvalidComputed { model, .. }
            | Self::UndefinedFields { model, .. }
            | Self::UnknownField { model, .. }
            | Self::MissingFields { model, .. }
            | Self::TypeMismatch { model, .. }
            | Self::Conversion { model, .. } => model,
        }
    }

    /// Returns true for errors raised while a definition is being built.
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            Self::MultiplePrimary { .. } | Self::DuplicateName { .. }
        )
    }

    /// Returns true for computed-field resolution errors.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::MissingMethods { .. } | Self::InvalidComputed { .. }
        )
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the underlying storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database file or data is corrupted.
    #[error("Database corrupted: {0}")]
    Corrupted(String),

    /// Database is locked by another process.
    #[error("Database is locked by another writer")]
    DatabaseLocked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),

    /// Database schema version doesn't match expected version.
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version.
        expected: u32,
        /// Actual schema version found in database.
        found: u32,
    },

    /// Table not found in database.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A document with the same primary key already exists.
    #[error("Duplicate primary key {key} in table {table}")]
    DuplicateKey {
        /// Qualified table name.
        table: String,
        /// Canonical JSON of the key.
        key: String,
    },

    /// The field has no secondary index in the table.
    #[error("No index on {field} in table {table}")]
    IndexNotFound {
        /// Qualified table name.
        table: String,
        /// Field name.
        field: String,
    },

    /// The connection was closed before the operation ran.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a transaction error with the given message.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a redb error with the given message.
    pub fn redb(msg: impl Into<String>) -> Self {
        Self::Redb(msg.into())
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Also allow direct conversion to ModelDBError for convenience
impl From<redb::Error> for ModelDBError {
    fn from(err: redb::Error) -> Self {
        ModelDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::DatabaseError> for ModelDBError {
    fn from(err: redb::DatabaseError) -> Self {
        ModelDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for ModelDBError {
    fn from(err: redb::TransactionError) -> Self {
        ModelDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::CommitError> for ModelDBError {
    fn from(err: redb::CommitError) -> Self {
        ModelDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::TableError> for ModelDBError {
    fn from(err: redb::TableError) -> Self {
        ModelDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::StorageError> for ModelDBError {
    fn from(err: redb::StorageError) -> Self {
        ModelDBError::Storage(StorageError::from(err))
    }
}

impl From<bincode::Error> for ModelDBError {
    fn from(err: bincode::Error) -> Self {
        ModelDBError::Storage(StorageError::from(err))
    }
}

impl From<serde_json::Error> for ModelDBError {
    fn from(err: serde_json::Error) -> Self {
        ModelDBError::Storage(StorageError::from(err))
    }
}

impl From<tokio::task::JoinError> for ModelDBError {
    fn from(err: tokio::task::JoinError) -> Self {
        ModelDBError::Runtime(format!("Blocking task failed: {}", err))
    }
}

/// Not found errors for specific entity types.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// Logical database not found.
    #[error("Database not found: {0}")]
    Database(String),
}

impl NotFoundError {
    /// Creates a database not found error.
    pub fn database(name: impl Into<String>) -> Self {
        Self::Database(name.into())
    }
}
