//! Field descriptors.
//!
//! A [`Field`] describes one named, typed attribute of a model: its semantic
//! type and the flags controlling its role (primary key, required, indexed,
//! nested or related sub-model, computed value).
//!
//! Fields are declared with a consuming builder and attached to a model by
//! [`ModelBuilder::field`](crate::ModelBuilder::field), which assigns the
//! name. A field is immutable once its definition is built.
//!
//! # Derived Rules
//!
//! - `primary` implies `required`
//! - a field whose type is another model is always `required`
//!
//! # Example
//!
//! ```rust
//! use modeldb::Field;
//!
//! let email = Field::string().primary();
//! assert!(email.is_required());
//!
//! let age = Field::integer().indexed();
//! assert!(!age.is_required());
//! ```

pub mod types;

pub use types::{value_type_name, FieldType};

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::model::ModelDefinition;

/// Zero-argument function producing a computed value.
pub type ComputedFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Where a computed field gets its value from.
#[derive(Clone)]
pub enum Computed {
    /// A free function, called without arguments.
    Function(ComputedFn),

    /// The name of a method registered on the model with
    /// [`ModelBuilder::method`](crate::ModelBuilder::method).
    ///
    /// Resolved to the bound method once per definition, on first record
    /// construction.
    Method(String),
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Function(..)"),
            Self::Method(name) => f.debug_tuple("Method").field(name).finish(),
        }
    }
}

/// Description of one model attribute.
#[derive(Clone, Debug)]
pub struct Field {
    name: Option<String>,
    field_type: FieldType,
    primary: bool,
    required: bool,
    related: bool,
    indexed: bool,
    computed: Option<Computed>,
    computed_empty: bool,
    computed_type: bool,
    synthetic: bool,
}

impl Field {
    /// Creates a field of the given type with every flag cleared.
    pub fn of(field_type: FieldType) -> Self {
        let required = field_type.is_model();
        Self {
            name: None,
            field_type,
            primary: false,
            required,
            related: false,
            indexed: false,
            computed: None,
            computed_empty: false,
            computed_type: false,
            synthetic: false,
        }
    }

    /// Creates a string field.
    pub fn string() -> Self {
        Self::of(FieldType::String)
    }

    /// Creates an integer field.
    pub fn integer() -> Self {
        Self::of(FieldType::Integer)
    }

    /// Creates a float field.
    pub fn float() -> Self {
        Self::of(FieldType::Float)
    }

    /// Creates a boolean field.
    pub fn boolean() -> Self {
        Self::of(FieldType::Boolean)
    }

    /// Creates a mapping (JSON object) field.
    pub fn mapping() -> Self {
        Self::of(FieldType::Mapping)
    }

    /// Creates a sequence (JSON array) field.
    pub fn sequence() -> Self {
        Self::of(FieldType::Sequence)
    }

    /// Creates an untyped field; values are stored unchanged.
    pub fn any() -> Self {
        Self::of(FieldType::Any)
    }

    /// Creates a field holding a record of another model.
    ///
    /// The field is nested (embedded) unless [`related`](Self::related) is
    /// set. Either way it is required.
    pub fn model(definition: &Arc<ModelDefinition>) -> Self {
        Self::of(FieldType::Model(Arc::clone(definition)))
    }

    /// Marks the field as the model's primary key. Implies `required`.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.required = true;
        self
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Clears `required`, unless it is forced by `primary` or a model type.
    pub fn optional(mut self) -> Self {
        self.required = self.primary || self.field_type.is_model();
        self
    }

    /// Marks a model-typed field as a reference rather than an embedded record.
    pub fn related(mut self) -> Self {
        self.related = true;
        self
    }

    /// Marks the field for a secondary index in the backing store.
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Computes the field with a zero-argument function.
    pub fn computed_fn<F>(mut self, function: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.computed = Some(Computed::Function(Arc::new(function)));
        self
    }

    /// Computes the field with a method registered on the model.
    pub fn computed_method(mut self, method: impl Into<String>) -> Self {
        self.computed = Some(Computed::Method(method.into()));
        self
    }

    /// Omits the computed field from serialized output while it has no
    /// explicitly set value.
    pub fn computed_empty(mut self) -> Self {
        self.computed_empty = true;
        self
    }

    /// Emits the computed value without conversion and rejects manual
    /// assignments whose runtime type differs from the declared type.
    pub fn computed_type(mut self) -> Self {
        self.computed_type = true;
        self
    }

    /// The synthetic `id` primary field added to models without one.
    ///
    /// Primary, but not flagged required: a record may be written without a
    /// key and have one generated by the store.
    pub(crate) fn synthetic_primary() -> Self {
        let mut field = Self::string();
        field.name = Some("id".to_string());
        field.primary = true;
        field.synthetic = true;
        field
    }

    pub(crate) fn attach(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Returns the field name, or `""` before the field is attached to a model.
    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Returns true once the field belongs to a model definition.
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.name.is_some()
    }

    /// Returns the declared type.
    #[inline]
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Returns true for the primary key field.
    #[inline]
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Returns true if the field must be set for validated serialization.
    #[inline]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns true if the `related` flag is set.
    #[inline]
    pub fn is_related(&self) -> bool {
        self.related
    }

    /// Returns true if the field is indexed.
    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Returns the computed source, if the field is computed.
    #[inline]
    pub fn computed(&self) -> Option<&Computed> {
        self.computed.as_ref()
    }

    /// Returns true if the field is computed.
    #[inline]
    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    /// Returns true if the `computed_empty` flag is set.
    #[inline]
    pub fn is_computed_empty(&self) -> bool {
        self.computed_empty
    }

    /// Returns true if the `computed_type` flag is set.
    #[inline]
    pub fn is_computed_type(&self) -> bool {
        self.computed_type
    }

    /// Returns true for the generated `id` primary field.
    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Returns the sub-model definition for nested and related fields.
    #[inline]
    pub fn model_definition(&self) -> Option<&Arc<ModelDefinition>> {
        self.field_type.model()
    }

    /// Returns true for an embedded sub-model field.
    #[inline]
    pub fn is_nested(&self) -> bool {
        self.field_type.is_model() && !self.related
    }

    /// Returns true for a referenced sub-model field.
    #[inline]
    pub fn is_reference(&self) -> bool {
        self.field_type.is_model() && self.related
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Field name:{} type:{} primary:{} required:{} related:{} indexed:{} computed:{}>",
            self.name.as_deref().unwrap_or("None"),
            self.field_type,
            self.primary,
            self.required,
            self.related,
            self.indexed,
            self.computed.is_some()
        )
    }
}
