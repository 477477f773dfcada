//! Model declaration and analysis.
//!
//! [`ModelBuilder`] collects field and method declarations and turns them
//! into a [`ModelDefinition`] in one pass:
//!
//! ```text
//! ModelBuilder::build()
//!     ├── tableize(name)              ← storage table name
//!     ├── merge inherited + own       ← stable field order
//!     ├── classify                    ← nested / related / required / indexed / computed
//!     └── primary key                 ← exactly one, `id` synthesized if none
//! ```
//!
//! `build()` is the registration point of a model: a definition error is
//! returned there and no definition exists afterwards.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{ModelError, Result};
use crate::field::Field;
use crate::record::Record;

use super::{tableize, MethodFn, ModelDefinition};

/// Declares a model.
///
/// # Field Order
///
/// Inherited fields come first, in the order of their base definition (bases
/// in the order they were added), followed by own fields in declaration
/// order. An own field named like an inherited one replaces it in place.
///
/// # Example
///
/// ```rust
/// use modeldb::{Field, ModelDefinition};
/// use serde_json::json;
///
/// let person = ModelDefinition::builder("Person")
///     .field("first", Field::string())
///     .field("last", Field::string())
///     .field("full", Field::string().computed_method("full_name"))
///     .method("full_name", |record| {
///         let first = record.value("first").and_then(|v| v.as_str()).unwrap_or_default();
///         let last = record.value("last").and_then(|v| v.as_str()).unwrap_or_default();
///         json!(format!("{} {}", first, last))
///     })
///     .build()?;
///
/// assert_eq!(person.computed().count(), 1);
/// # Ok::<(), modeldb::ModelDBError>(())
/// ```
pub struct ModelBuilder {
    name: String,
    inherited: Vec<Field>,
    own: Vec<Field>,
    methods: IndexMap<String, MethodFn>,
    own_methods: HashSet<String>,
    duplicates: Vec<String>,
}

impl ModelBuilder {
    /// Starts declaring a model with the given type name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inherited: Vec::new(),
            own: Vec::new(),
            methods: IndexMap::new(),
            own_methods: HashSet::new(),
            duplicates: Vec::new(),
        }
    }

    /// Inherits the fields and methods of a base definition.
    ///
    /// A base's synthesized `id` field is not inherited; the derived model
    /// decides its own primary key.
    pub fn extends(mut self, base: &ModelDefinition) -> Self {
        for field in base.fields().iter().filter(|field| !field.is_synthetic()) {
            match self
                .inherited
                .iter()
                .position(|existing| existing.name() == field.name())
            {
                Some(position) => self.inherited[position] = field.clone(),
                None => self.inherited.push(field.clone()),
            }
        }

        for (name, method) in &base.methods {
            if !self.own_methods.contains(name) {
                self.methods.insert(name.clone(), Arc::clone(method));
            }
        }

        self
    }

    /// Declares a field; the builder assigns its name.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();
        if self.own.iter().any(|existing| existing.name() == name) {
            self.duplicates.push(name);
            return self;
        }
        self.own.push(field.attach(&name));
        self
    }

    /// Registers a method usable as a computed source.
    ///
    /// The method receives the record it is evaluated for.
    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        if !self.own_methods.insert(name.clone()) {
            self.duplicates.push(name);
            return self;
        }
        self.methods.insert(name, Arc::new(method));
        self
    }

    /// Analyzes the declarations and produces the definition.
    ///
    /// # Errors
    ///
    /// - [`ModelError::DuplicateName`] if a field or method is declared twice,
    ///   a method shares its name with a field, or a non-primary field named
    ///   `id` blocks the synthesized primary key
    /// - [`ModelError::MultiplePrimary`] if more than one field is primary
    #[instrument(skip(self), fields(model = %self.name))]
    pub fn build(self) -> Result<Arc<ModelDefinition>> {
        let Self {
            name,
            inherited,
            own,
            methods,
            duplicates,
            ..
        } = self;

        if let Some(duplicate) = duplicates.into_iter().next() {
            return Err(ModelError::DuplicateName {
                model: name,
                name: duplicate,
            }
            .into());
        }

        let mut fields = inherited;
        for field in own {
            match fields.iter().position(|existing| existing.name() == field.name()) {
                Some(position) => fields[position] = field,
                None => fields.push(field),
            }
        }

        if let Some(clash) = methods.keys().find(|method| {
            fields
                .iter()
                .any(|field| field.name() == method.as_str())
        }) {
            return Err(ModelError::DuplicateName {
                model: name,
                name: clash.clone(),
            }
            .into());
        }

        let mut nested = Vec::new();
        let mut related = Vec::new();
        let mut required = Vec::new();
        let mut indexed = Vec::new();
        let mut computed = Vec::new();

        for (position, field) in fields.iter().enumerate() {
            if field.field_type().is_model() {
                if field.is_related() {
                    related.push(position);
                } else {
                    nested.push(position);
                }
            }
            if field.is_required() {
                required.push(position);
            }
            if field.is_indexed() {
                indexed.push(position);
            }
            if field.is_computed() {
                computed.push(position);
            }
        }

        let primaries: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.is_primary())
            .map(|(position, _)| position)
            .collect();

        let primary = match primaries.as_slice() {
            [] => {
                if fields.iter().any(|field| field.name() == "id") {
                    return Err(ModelError::DuplicateName { model: name, name: "id".into() }.into());
                }
                fields.push(Field::synthetic_primary());
                fields.len() - 1
            }
            [only] => *only,
            _ => {
                return Err(ModelError::MultiplePrimary {
                    model: name,
                    fields: primaries
                        .iter()
                        .map(|&position| fields[position].name().to_string())
                        .collect(),
                }
                .into())
            }
        };

        let table = tableize(&name);

        debug!(
            table = %table,
            fields = fields.len(),
            nested = nested.len(),
            related = related.len(),
            required = required.len(),
            indexed = indexed.len(),
            computed = computed.len(),
            primary = fields[primary].name(),
            "Model defined"
        );

        Ok(Arc::new(ModelDefinition {
            name,
            table,
            fields,
            nested,
            related,
            required,
            indexed,
            computed,
            primary,
            methods,
            resolved: OnceLock::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(definition: &ModelDefinition) -> Vec<&str> {
        definition.fields().iter().map(Field::name).collect()
    }

    #[test]
    fn test_declaration_order_is_kept() {
        let model = ModelDefinition::builder("Ordered")
            .field("zeta", Field::string())
            .field("alpha", Field::string())
            .field("mid", Field::string())
            .build()
            .unwrap();

        assert_eq!(names(&model), vec!["zeta", "alpha", "mid", "id"]);
    }

    #[test]
    fn test_inherited_fields_come_first() {
        let base = ModelDefinition::builder("Base")
            .field("created", Field::string())
            .field("kind", Field::string())
            .build()
            .unwrap();

        let derived = ModelDefinition::builder("Derived")
            .field("title", Field::string())
            .extends(&base)
            .field("kind", Field::integer())
            .build()
            .unwrap();

        assert_eq!(names(&derived), vec!["created", "kind", "title", "id"]);
        assert_eq!(derived.field("kind").unwrap().field_type().name(), "integer");
    }

    #[test]
    fn test_base_synthetic_id_not_inherited() {
        let base = ModelDefinition::builder("Base")
            .field("created", Field::string())
            .build()
            .unwrap();

        let derived = ModelDefinition::builder("Derived")
            .extends(&base)
            .field("key", Field::string().primary())
            .build()
            .unwrap();

        assert_eq!(derived.primary().name(), "key");
        assert!(derived.field("id").is_none());
    }

    #[test]
    fn test_inherited_primary_conflicts_with_own() {
        let base = ModelDefinition::builder("Base")
            .field("key", Field::string().primary())
            .build()
            .unwrap();

        let err = ModelDefinition::builder("Derived")
            .extends(&base)
            .field("other", Field::string().primary())
            .build()
            .unwrap_err();

        assert!(matches!(
            err.as_model(),
            Some(ModelError::MultiplePrimary { model, .. }) if model == "Derived"
        ));
    }

    #[test]
    fn test_methods_are_inherited_and_overridable() {
        let base = ModelDefinition::builder("Base")
            .method("label", |_| json!("base"))
            .method("kind", |_| json!("base"))
            .build()
            .unwrap();

        let derived = ModelDefinition::builder("Derived")
            .method("label", |_| json!("derived"))
            .extends(&base)
            .build()
            .unwrap();

        let mut method_names: Vec<&str> = derived.method_names().collect();
        method_names.sort_unstable();
        assert_eq!(method_names, vec!["kind", "label"]);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = ModelDefinition::builder("Dup")
            .field("a", Field::string())
            .field("a", Field::integer())
            .build()
            .unwrap_err();

        assert_eq!(
            err.as_model(),
            Some(&ModelError::DuplicateName {
                model: "Dup".into(),
                name: "a".into()
            })
        );
    }

    #[test]
    fn test_method_named_like_field_rejected() {
        let err = ModelDefinition::builder("Clash")
            .field("total", Field::integer())
            .method("total", |_| json!(1))
            .build()
            .unwrap_err();

        assert!(err.as_model().is_some_and(ModelError::is_definition));
    }

    #[test]
    fn test_plain_id_field_blocks_synthesis() {
        let err = ModelDefinition::builder("Legacy")
            .field("id", Field::integer())
            .build()
            .unwrap_err();

        assert!(matches!(
            err.as_model(),
            Some(ModelError::DuplicateName { name, .. }) if name == "id"
        ));
    }

    #[test]
    fn test_primary_named_id_is_kept() {
        let model = ModelDefinition::builder("Keyed")
            .field("id", Field::integer().primary())
            .build()
            .unwrap();

        assert_eq!(names(&model), vec!["id"]);
        assert!(!model.primary().is_synthetic());
        assert!(model.primary().is_required());
    }
}
