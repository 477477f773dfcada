//! Model definitions.
//!
//! A [`ModelDefinition`] is the analyzed, immutable schema of one model: its
//! fields in a stable order, the role sets derived from their flags, the
//! primary key and the storage table name. Definitions are produced once by
//! [`ModelBuilder::build`] and shared as `Arc<ModelDefinition>`; nothing in
//! them changes afterwards, so records of the same model can be created from
//! any number of threads without further synchronization.
//!
//! # Role Sets
//!
//! | Set | Members |
//! |-----|---------|
//! | `fields` | every field, inherited first, then own fields in declaration order |
//! | `nested` | model-typed fields without `related` |
//! | `related` | model-typed fields with `related` |
//! | `required` | fields with `required` (including primary and model-typed fields) |
//! | `indexed` | fields with `indexed` |
//! | `computed` | fields with a computed source |
//! | `primary` | the single primary field, synthesized as `id` when none is declared |
//!
//! # Example
//!
//! ```rust
//! use modeldb::{Field, ModelDefinition};
//!
//! let address = ModelDefinition::builder("Address")
//!     .field("city", Field::string().required())
//!     .build()?;
//!
//! let user = ModelDefinition::builder("User")
//!     .field("email", Field::string().indexed())
//!     .field("address", Field::model(&address))
//!     .build()?;
//!
//! assert_eq!(user.table(), "users");
//! assert_eq!(user.primary().name(), "id");
//! assert_eq!(user.nested().count(), 1);
//! # Ok::<(), modeldb::ModelDBError>(())
//! ```

mod builder;
mod computed;
mod naming;

pub use builder::ModelBuilder;
pub use computed::MethodFn;
pub use naming::{pluralize, tableize};

pub(crate) use computed::ResolvedComputed;

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use crate::error::ModelError;
use crate::field::Field;

/// Analyzed schema of one model.
pub struct ModelDefinition {
    name: String,
    table: String,
    fields: Vec<Field>,
    nested: Vec<usize>,
    related: Vec<usize>,
    required: Vec<usize>,
    indexed: Vec<usize>,
    computed: Vec<usize>,
    primary: usize,
    methods: IndexMap<String, MethodFn>,

    /// Outcome of computed-field resolution, filled on first record construction.
    resolved: OnceLock<Result<Arc<ResolvedComputed>, ModelError>>,
}

impl ModelDefinition {
    /// Starts declaring a model with the given type name.
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name)
    }

    /// Returns the model name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the storage table name derived from the model name.
    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns every field in enumeration order.
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the embedded sub-model fields.
    pub fn nested(&self) -> impl Iterator<Item = &Field> + '_ {
        self.select(&self.nested)
    }

    /// Returns the referenced sub-model fields.
    pub fn related(&self) -> impl Iterator<Item = &Field> + '_ {
        self.select(&self.related)
    }

    /// Returns the required fields.
    pub fn required(&self) -> impl Iterator<Item = &Field> + '_ {
        self.select(&self.required)
    }

    /// Returns the fields that need a secondary index.
    pub fn indexed(&self) -> impl Iterator<Item = &Field> + '_ {
        self.select(&self.indexed)
    }

    /// Returns the computed fields.
    pub fn computed(&self) -> impl Iterator<Item = &Field> + '_ {
        self.select(&self.computed)
    }

    /// Returns the primary key field.
    #[inline]
    pub fn primary(&self) -> &Field {
        &self.fields[self.primary]
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.position(name).map(|position| &self.fields[position])
    }

    /// Returns the enumeration position of a field.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name() == name)
    }

    /// Looks up a registered method by name.
    pub fn method(&self, name: &str) -> Option<&MethodFn> {
        self.methods.get(name)
    }

    /// Returns the names of the registered methods.
    pub fn method_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.methods.keys().map(String::as_str)
    }

    /// Resolves a field by name.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownField`] naming the model and the field.
    pub fn check_field(&self, name: &str) -> Result<&Field, ModelError> {
        self.field(name).ok_or_else(|| ModelError::UnknownField {
            model: self.name.clone(),
            field: name.to_string(),
        })
    }

    /// Rejects keys that are not declared field names.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UndefinedFields`] listing every undeclared key
    /// in input order.
    pub fn check_undefined<'a, I>(&self, keys: I) -> Result<(), ModelError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let undefined: Vec<String> = keys
            .into_iter()
            .filter(|key| self.field(key).is_none())
            .map(str::to_string)
            .collect();

        if undefined.is_empty() {
            Ok(())
        } else {
            Err(ModelError::UndefinedFields {
                model: self.name.clone(),
                fields: undefined,
            })
        }
    }

    /// Binds computed fields to callables, once per definition.
    ///
    /// The first call does the work; later calls return the cached outcome,
    /// including a cached failure.
    pub(crate) fn resolve_computed(&self) -> Result<Arc<ResolvedComputed>, ModelError> {
        self.resolved
            .get_or_init(|| computed::resolve(self).map(Arc::new))
            .clone()
    }

    fn select<'a>(&'a self, positions: &'a [usize]) -> impl Iterator<Item = &'a Field> + 'a {
        positions.iter().map(move |&position| &self.fields[position])
    }
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("name", &self.name)
            .field("table", &self.table)
            .field(
                "fields",
                &self.fields.iter().map(Field::name).collect::<Vec<_>>(),
            )
            .field("primary", &self.primary().name())
            .finish_non_exhaustive()
    }
}
