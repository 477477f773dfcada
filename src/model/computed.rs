//! Computed-field resolution.
//!
//! A computed field names either a free function or a method registered on
//! its model. Method names are looked up once per definition and the bound
//! form is cached, so records never resolve by name again.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::ModelError;
use crate::field::{Computed, ComputedFn};
use crate::record::Record;

use super::ModelDefinition;

/// Method registered on a model; receives the record it is called on.
pub type MethodFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// A computed source ready to call.
#[derive(Clone)]
pub(crate) enum Resolved {
    Function(ComputedFn),
    Method(MethodFn),
}

impl Resolved {
    pub(crate) fn call(&self, record: &Record) -> Value {
        match self {
            Self::Function(function) => function(),
            Self::Method(method) => method(record),
        }
    }
}

/// Resolved computed sources, indexed like the definition's fields.
#[derive(Clone, Default)]
pub(crate) struct ResolvedComputed {
    by_position: Vec<Option<Resolved>>,
}

impl ResolvedComputed {
    pub(crate) fn get(&self, position: usize) -> Option<&Resolved> {
        self.by_position.get(position).and_then(Option::as_ref)
    }
}

/// Binds every computed field of a definition to something callable.
///
/// Fails with [`ModelError::MissingMethods`] if a method name matches
/// neither a method nor a field, and with [`ModelError::InvalidComputed`]
/// if it names a plain field instead of a method.
pub(crate) fn resolve(definition: &ModelDefinition) -> Result<ResolvedComputed, ModelError> {
    let named: Vec<(&str, &str)> = definition
        .computed()
        .filter_map(|field| match field.computed() {
            Some(Computed::Method(method)) => Some((field.name(), method.as_str())),
            _ => None,
        })
        .collect();

    let missing: Vec<String> = named
        .iter()
        .filter(|(_, method)| {
            definition.method(method).is_none() && definition.field(method).is_none()
        })
        .map(|(_, method)| method.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ModelError::MissingMethods {
            model: definition.name().to_string(),
            methods: missing,
        });
    }

    let invalid: Vec<String> = named
        .iter()
        .filter(|(_, method)| definition.method(method).is_none())
        .map(|(field, _)| field.to_string())
        .collect();

    if !invalid.is_empty() {
        return Err(ModelError::InvalidComputed {
            model: definition.name().to_string(),
            fields: invalid,
        });
    }

    let by_position = definition
        .fields()
        .iter()
        .map(|field| match field.computed() {
            Some(Computed::Function(function)) => Some(Resolved::Function(Arc::clone(function))),
            Some(Computed::Method(method)) => definition
                .method(method)
                .map(|bound| Resolved::Method(Arc::clone(bound))),
            None => None,
        })
        .collect();

    debug!(
        model = definition.name(),
        methods = named.len(),
        "Computed fields resolved"
    );

    Ok(ResolvedComputed { by_position })
}
