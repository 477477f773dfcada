//! # ModelDB
//!
//! Declarative document models with validated serialization, persisted to an
//! embedded document store.
//!
//! A model is declared once as a set of typed fields. ModelDB analyzes the
//! declaration into an immutable [`ModelDefinition`], creates [`Record`]s
//! that convert every assigned value through its field's type, and turns
//! records into plain JSON mappings ready for storage.
//!
//! ## Quick Start
//!
//! ```rust
//! use modeldb::{Field, ModelDefinition, Record};
//! use serde_json::json;
//!
//! let address = ModelDefinition::builder("Address")
//!     .field("city", Field::string().required())
//!     .build()?;
//!
//! let user = ModelDefinition::builder("User")
//!     .field("email", Field::string().primary())
//!     .field("age", Field::integer())
//!     .field("address", Field::model(&address))
//!     .build()?;
//!
//! let mut record = Record::new(&user)?;
//! record.set("email", "ada@example.com")?;
//! record.set("age", "36")?;
//! record.set("address", json!({"city": "London"}))?;
//!
//! let document = record.serialize(true)?;
//! assert_eq!(document["age"], json!(36));
//! assert_eq!(document["address"], json!({"city": "London"}));
//! # Ok::<(), modeldb::ModelDBError>(())
//! ```
//!
//! ## Key Concepts
//!
//! ### Fields
//!
//! A [`Field`] carries a semantic type ([`FieldType`]) and flags: `primary`,
//! `required`, `related`, `indexed` and an optional computed source. A field
//! typed with another model holds a sub-record.
//!
//! ### Definitions
//!
//! [`ModelDefinition::builder`] collects fields, methods and base models;
//! [`ModelBuilder::build`] checks them and derives the role sets (nested,
//! related, required, indexed, computed), the primary key and the table
//! name. A model without a primary field gets a synthesized `id`.
//!
//! ### Records
//!
//! [`Record::set`] is the single write path. Required fields are checked
//! only on request, by [`Record::check_missing`] or `serialize(true)`.
//!
//! ### Persistence
//!
//! [`Collection`] stores records of one model in a [`storage::RedbStore`]
//! table, reusing connections through the [`ConnectionRegistry`].
//!
//! ## Thread Safety
//!
//! Definitions and records are `Send + Sync`. A definition never changes
//! after `build()`; computed sources are bound on the first record
//! construction behind a one-time barrier.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod collection;
mod config;
mod connection;
mod error;
mod types;

pub mod field;
pub mod model;
pub mod record;
pub mod storage;

// ============================================================================
// Public API re-exports
// ============================================================================

// Models
pub use field::{Computed, ComputedFn, Field, FieldType};
pub use model::{pluralize, tableize, MethodFn, ModelBuilder, ModelDefinition};
pub use record::{FieldValue, Record};

// Persistence
pub use collection::Collection;
pub use config::{ConnectionOptions, SyncMode, DEFAULT_DB};
pub use connection::{canonical_json, options_hash, Connection, ConnectionRegistry};

// Error handling
pub use error::{ModelDBError, ModelError, NotFoundError, Result, StorageError};

// Core types
pub use types::{DocumentKey, Timestamp};

// Storage (for advanced users)
pub use storage::{DatabaseMetadata, DocumentStore, TableSpec};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common ModelDB usage.
///
/// ```rust
/// use modeldb::prelude::*;
/// ```
pub mod prelude {
    pub use crate::collection::Collection;
    pub use crate::config::ConnectionOptions;
    pub use crate::error::{ModelDBError, ModelError, Result};
    pub use crate::field::{Field, FieldType};
    pub use crate::model::ModelDefinition;
    pub use crate::record::{FieldValue, Record};
}
