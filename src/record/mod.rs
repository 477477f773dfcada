//! Records: instances of a model definition.
//!
//! A [`Record`] owns a mapping from field name to [`FieldValue`]. Every write
//! goes through [`Record::set`] (or its bulk form [`Record::assign`]), which
//! applies the field's conversion rules:
//!
//! - model-typed fields turn a raw JSON object into a record of the
//!   sub-model and keep anything else unchanged
//! - `computed_type` fields accept only values whose runtime type already
//!   matches the declared type
//! - every other field converts the value through its declared type
//!
//! Required fields are only enforced when asked for, by
//! [`Record::check_missing`] or `serialize(true)`.
//!
//! # Example
//!
//! ```rust
//! use modeldb::{Field, ModelDefinition, Record};
//! use serde_json::json;
//!
//! let beta = ModelDefinition::builder("Beta")
//!     .field("field", Field::string())
//!     .build()?;
//! let alpha = ModelDefinition::builder("Alpha")
//!     .field("f", Field::string())
//!     .field("beta", Field::model(&beta))
//!     .build()?;
//!
//! let mut record = Record::new(&alpha)?;
//! record.set("f", "x")?;
//! record.set("beta", json!({"field": "value"}))?;
//!
//! assert_eq!(record.nested("beta").unwrap().value("field"), Some(&json!("value")));
//! assert_eq!(record.serialize(true)?["f"], json!("x"));
//! # Ok::<(), modeldb::ModelDBError>(())
//! ```

mod serialize;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::field::{value_type_name, Field};
use crate::model::{ModelDefinition, ResolvedComputed};

/// The value stored in one field of a record.
#[derive(Clone, PartialEq)]
pub enum FieldValue {
    /// A plain JSON value.
    Value(Value),
    /// A sub-model record, owned by this slot.
    Record(Box<Record>),
}

impl FieldValue {
    /// Returns the JSON value, if this is not a record.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Record(_) => None,
        }
    }

    /// Returns the record, if this slot holds one.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(&**record),
            Self::Value(_) => None,
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{}", value),
            Self::Record(record) => fmt::Debug::fmt(record, f),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Map<String, Value>> for FieldValue {
    fn from(map: Map<String, Value>) -> Self {
        Self::Value(Value::Object(map))
    }
}

impl From<Record> for FieldValue {
    fn from(record: Record) -> Self {
        Self::Record(Box::new(record))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Value(Value::from(value))
    }
}

/// An instance of a model definition.
#[derive(Clone)]
pub struct Record {
    definition: Arc<ModelDefinition>,
    computed: Arc<ResolvedComputed>,
    values: IndexMap<String, FieldValue>,
}

impl Record {
    /// Creates an empty record.
    ///
    /// # Errors
    ///
    /// Returns a resolution error ([`ModelError::MissingMethods`] or
    /// [`ModelError::InvalidComputed`]) if a computed field names a method
    /// the model does not provide.
    pub fn new(definition: &Arc<ModelDefinition>) -> Result<Self> {
        let computed = definition.resolve_computed()?;
        debug!(model = definition.name(), "Record constructed");
        Ok(Self {
            definition: Arc::clone(definition),
            computed,
            values: IndexMap::new(),
        })
    }

    /// Creates a record from a JSON object.
    pub fn from_map(definition: &Arc<ModelDefinition>, map: Map<String, Value>) -> Result<Self> {
        let mut record = Self::new(definition)?;
        record.assign_map(map)?;
        Ok(record)
    }

    /// Creates a record from an optional JSON object plus overrides.
    ///
    /// Overrides win over keys of the mapping.
    pub fn with<I, K, V>(
        definition: &Arc<ModelDefinition>,
        mapping: Option<Map<String, Value>>,
        overrides: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut record = Self::new(definition)?;
        record.assign(mapping, overrides)?;
        Ok(record)
    }

    /// Returns the record's model definition.
    #[inline]
    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    /// Assigns a single field.
    ///
    /// This is the only way to change a field; every other write path goes
    /// through it.
    ///
    /// # Errors
    ///
    /// - [`ModelError::UnknownField`] if the model has no such field
    /// - [`ModelError::TypeMismatch`] for a `computed_type` field given a value
    ///   of another runtime type
    /// - [`ModelError::Conversion`] if the value cannot be converted
    /// - any error from constructing a nested record out of a JSON object
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let prepared = self.prepare(name, value.into())?;
        self.values.insert(name.to_string(), prepared);
        Ok(())
    }

    /// Assigns many fields at once.
    ///
    /// `overrides` are merged into `mapping` (overrides win). Undeclared keys
    /// are rejected before anything is written, and all values are converted
    /// before any is stored: on error the record is unchanged.
    ///
    /// # Errors
    ///
    /// [`ModelError::UndefinedFields`] listing every undeclared key, or any
    /// error [`set`](Self::set) can return.
    pub fn assign<I, K, V>(&mut self, mapping: Option<Map<String, Value>>, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut merged: IndexMap<String, FieldValue> = mapping
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, FieldValue::Value(value)))
            .collect();
        for (key, value) in overrides {
            merged.insert(key.into(), value.into());
        }

        self.definition
            .check_undefined(merged.keys().map(String::as_str))?;

        let mut staged = Vec::with_capacity(merged.len());
        for (key, value) in merged {
            let prepared = self.prepare(&key, value)?;
            staged.push((key, prepared));
        }
        self.values.extend(staged);
        Ok(())
    }

    /// Assigns every key of a JSON object.
    pub fn assign_map(&mut self, map: Map<String, Value>) -> Result<()> {
        self.assign(Some(map), std::iter::empty::<(String, FieldValue)>())
    }

    /// Returns the stored value of a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Returns the stored JSON value of a field; `None` for unset fields and
    /// fields holding a record.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(FieldValue::as_value)
    }

    /// Returns the record stored in a nested or related field.
    pub fn nested(&self, name: &str) -> Option<&Record> {
        self.get(name).and_then(FieldValue::as_record)
    }

    /// Returns the record stored in a nested or related field for in-place
    /// changes through its own [`set`](Self::set).
    pub fn nested_mut(&mut self, name: &str) -> Option<&mut Record> {
        match self.values.get_mut(name) {
            Some(FieldValue::Record(record)) => Some(&mut **record),
            _ => None,
        }
    }

    /// Returns true if the field has an explicitly set value.
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterates over the set fields in assignment order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &FieldValue)> + '_ {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the value of the primary key field, if set.
    pub fn primary_key(&self) -> Option<&Value> {
        self.value(self.definition.primary().name())
    }

    /// Fails if a required field has no value.
    ///
    /// # Errors
    ///
    /// [`ModelError::MissingFields`] listing every unset required field in
    /// declaration order.
    pub fn check_missing(&self) -> Result<()> {
        let missing: Vec<String> = self
            .definition
            .required()
            .filter(|field| !self.values.contains_key(field.name()))
            .map(|field| field.name().to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ModelError::MissingFields {
                model: self.definition.name().to_string(),
                fields: missing,
            }
            .into())
        }
    }

    /// Fails if any key is not a declared field name.
    pub fn check_undefined<'a, I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        Ok(self.definition.check_undefined(keys)?)
    }

    /// Resolves a field by name.
    pub fn check_field(&self, name: &str) -> Result<&Field> {
        Ok(self.definition.check_field(name)?)
    }

    pub(crate) fn resolved(&self) -> &ResolvedComputed {
        &self.computed
    }

    pub(crate) fn raw_values(&self) -> &IndexMap<String, FieldValue> {
        &self.values
    }

    /// Converts a value for a field without storing it.
    fn prepare(&self, name: &str, value: FieldValue) -> Result<FieldValue> {
        let field = self.definition.check_field(name)?;

        if let Some(sub_model) = field.model_definition() {
            return match value {
                FieldValue::Value(Value::Object(map)) => {
                    let nested = Record::from_map(sub_model, map)?;
                    Ok(FieldValue::Record(Box::new(nested)))
                }
                other => Ok(other),
            };
        }

        let value = match value {
            FieldValue::Value(value) => value,
            FieldValue::Record(record) => Value::Object(record.serialize(false)?),
        };

        if field.is_computed_type() {
            if !field.field_type().matches(&value) {
                return Err(ModelError::TypeMismatch {
                    model: self.definition.name().to_string(),
                    field: name.to_string(),
                    expected: field.field_type().name().to_string(),
                    found: value_type_name(&value).to_string(),
                }
                .into());
            }
            return Ok(FieldValue::Value(value));
        }

        field
            .field_type()
            .coerce(value)
            .map(FieldValue::Value)
            .map_err(|reason| {
                ModelError::Conversion {
                    model: self.definition.name().to_string(),
                    field: name.to_string(),
                    reason,
                }
                .into()
            })
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.definition, &other.definition) && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.definition.name())
            .field("values", &self.values)
            .finish()
    }
}
