//! Semantic field types and value conversion.
//!
//! Every non-model [`FieldType`] doubles as a single-argument converter over
//! JSON values: assigning to a field runs the value through
//! [`FieldType::coerce`], the same way a cast to the declared primitive would.
//! [`FieldType::matches`] is the strict runtime test used by `computed_type`
//! fields, which refuse conversion entirely.

use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value};

use crate::model::ModelDefinition;

/// The declared type of a field.
#[derive(Clone)]
pub enum FieldType {
    /// UTF-8 string. Other values convert to their JSON text.
    String,
    /// Signed 64-bit integer (unsigned values that fit JSON are kept).
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean, converted by truthiness.
    Boolean,
    /// JSON object.
    Mapping,
    /// JSON array.
    Sequence,
    /// Any JSON value, stored unchanged.
    Any,
    /// Another model: nested (owned) or related (reference).
    Model(Arc<ModelDefinition>),
}

impl FieldType {
    /// Returns true if this type is another model definition.
    #[inline]
    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model(_))
    }

    /// Returns the referenced model definition, if any.
    #[inline]
    pub fn model(&self) -> Option<&Arc<ModelDefinition>> {
        match self {
            Self::Model(definition) => Some(definition),
            _ => None,
        }
    }

    /// Returns a short human-readable name for error messages.
    pub fn name(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Mapping => "mapping",
            Self::Sequence => "sequence",
            Self::Any => "any",
            Self::Model(definition) => definition.name(),
        }
    }

    /// Converts a value to this type.
    ///
    /// Returns the reason on failure; the caller attaches model and field
    /// names. Model types return the value unchanged since nested coercion
    /// needs a record, not a value.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        match self {
            Self::String => Ok(match value {
                Value::String(_) => value,
                other => Value::String(other.to_string()),
            }),
            Self::Integer => coerce_integer(value),
            Self::Float => coerce_float(value),
            Self::Boolean => Ok(Value::Bool(is_truthy(&value))),
            Self::Mapping => match value {
                Value::Object(_) => Ok(value),
                other => Err(format!("{} is not a mapping", value_type_name(&other))),
            },
            Self::Sequence => match value {
                Value::Array(_) => Ok(value),
                other => Err(format!("{} is not a sequence", value_type_name(&other))),
            },
            Self::Any | Self::Model(_) => Ok(value),
        }
    }

    /// Returns true if the value's runtime type is exactly this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_f64(),
            Self::Boolean => value.is_boolean(),
            Self::Mapping | Self::Model(_) => value.is_object(),
            Self::Sequence => value.is_array(),
            Self::Any => true,
        }
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(definition) => write!(f, "Model({})", definition.name()),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the runtime type name of a JSON value.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

fn coerce_integer(value: Value) -> Result<Value, String> {
    match value {
        Value::Number(ref n) if n.is_i64() || n.is_u64() => Ok(value),
        Value::Number(n) => {
            let float = n.as_f64().unwrap_or(f64::NAN);
            let truncated = float.trunc();
            if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64
            {
                Ok(Value::from(truncated as i64))
            } else {
                Err(format!("{} is out of integer range", float))
            }
        }
        Value::Bool(b) => Ok(Value::from(i64::from(b))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("invalid literal for integer: {:?}", s)),
        other => Err(format!(
            "{} is not convertible to integer",
            value_type_name(&other)
        )),
    }
}

fn coerce_float(value: Value) -> Result<Value, String> {
    let float = match value {
        Value::Number(ref n) => n.as_f64().unwrap_or(f64::NAN),
        Value::Bool(b) => {
            if b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(ref s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid literal for float: {:?}", s))?,
        ref other => {
            return Err(format!(
                "{} is not convertible to float",
                value_type_name(other)
            ))
        }
    };

    Number::from_f64(float)
        .map(Value::Number)
        .ok_or_else(|| format!("{} is not a finite float", float))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
