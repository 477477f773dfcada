//! Record serialization.
//!
//! `serialize` produces the plain JSON mapping used for storage and
//! transmission. Keys follow the definition's field order and are always
//! declared field names:
//!
//! | Field kind | Output |
//! |------------|--------|
//! | nested / related | the sub-record, serialized recursively (omitted while unset) |
//! | computed, `computed_empty`, never set | omitted |
//! | computed, `computed_type` | the callable's return value, unchanged |
//! | computed | the callable's return value, converted through the declared type |
//! | ordinary | the stored value (omitted while unset) |

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{ModelError, Result};

use super::{FieldValue, Record};

impl Record {
    /// Produces the storage representation of the record.
    ///
    /// With `verify`, required fields are checked first (recursively for
    /// sub-records) and a [`ModelError::MissingFields`] error is returned
    /// unchanged.
    ///
    /// Serializing an unmodified record twice yields equal mappings as long
    /// as its computed sources are deterministic.
    ///
    /// # Errors
    ///
    /// - [`ModelError::MissingFields`] when `verify` is set
    /// - [`ModelError::Conversion`] if a computed value cannot be converted
    pub fn serialize(&self, verify: bool) -> Result<Map<String, Value>> {
        if verify {
            self.check_missing()?;
        }

        let definition = self.definition();
        let values = self.raw_values();
        let mut output = Map::new();

        for (position, field) in definition.fields().iter().enumerate() {
            let name = field.name();
            let stored = values.get(name);

            if field.field_type().is_model() {
                match stored {
                    Some(FieldValue::Record(record)) => {
                        output.insert(name.to_string(), Value::Object(record.serialize(verify)?));
                    }
                    Some(FieldValue::Value(value)) => {
                        output.insert(name.to_string(), value.clone());
                    }
                    None => {}
                }
            } else if field.is_computed() {
                if field.is_computed_empty() && stored.is_none() {
                    continue;
                }
                let Some(source) = self.resolved().get(position) else {
                    continue;
                };

                let computed = source.call(self);
                let value = if field.is_computed_type() {
                    computed
                } else {
                    field.field_type().coerce(computed).map_err(|reason| {
                        ModelError::Conversion {
                            model: definition.name().to_string(),
                            field: name.to_string(),
                            reason,
                        }
                    })?
                };
                output.insert(name.to_string(), value);
            } else if let Some(stored) = stored {
                let value = match stored {
                    FieldValue::Value(value) => value.clone(),
                    FieldValue::Record(record) => Value::Object(record.serialize(verify)?),
                };
                output.insert(name.to_string(), value);
            }
        }

        Ok(output)
    }

    /// Serializes the record into a JSON object value.
    pub fn to_value(&self, verify: bool) -> Result<Value> {
        self.serialize(verify).map(Value::Object)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.serialize(false) {
            Ok(map) => write!(f, "{}", Value::Object(map)),
            Err(err) => write!(f, "<{} record: {}>", self.definition().name(), err),
        }
    }
}
