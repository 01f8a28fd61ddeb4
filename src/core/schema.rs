//! Input schemas - validate and coerce a pipeline's initial input

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use thiserror::Error;

/// The initial input did not match the pipeline schema
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("input does not match schema '{schema}': {message}")]
pub struct ValidationError {
    pub schema: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            message: message.into(),
        }
    }
}

/// Checks and coerces a pipeline input before any step runs
pub trait Schema: Send + Sync {
    /// Schema name used in error messages
    fn name(&self) -> &str;

    /// Validate the input, returning the (possibly coerced) value
    fn validate(&self, input: Value) -> Result<Value, ValidationError>;
}

/// Accepts any input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct AnySchema;

impl Schema for AnySchema {
    fn name(&self) -> &str {
        "any"
    }

    fn validate(&self, input: Value) -> Result<Value, ValidationError> {
        Ok(input)
    }
}

/// Schema backed by a serde type
///
/// The input is deserialized into `T` and serialized back, so defaults are
/// filled in and unknown fields are dropped.
pub struct TypedSchema<T> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self::named(short_type_name::<T>())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Schema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, input: Value) -> Result<Value, ValidationError> {
        let typed: T = serde_json::from_value(input)
            .map_err(|e| ValidationError::new(&self.name, e.to_string()))?;
        serde_json::to_value(typed).map_err(|e| ValidationError::new(&self.name, e.to_string()))
    }
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}

/// Kind of value a field must hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Array,
    Object,
    Any,
}

impl FieldKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Any => true,
        }
    }
}

#[derive(Debug, Clone)]
struct FieldRule {
    name: String,
    kind: FieldKind,
    required: bool,
}

/// Structural schema for JSON objects
///
/// Required fields must be present and non-null. Optional fields may be
/// missing or null. Keys not declared are stripped.
#[derive(Debug, Clone)]
pub struct ObjectSchema {
    name: String,
    fields: Vec<FieldRule>,
}

impl ObjectSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn required(mut self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldRule {
            name: field.into(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional(mut self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldRule {
            name: field.into(),
            kind,
            required: false,
        });
        self
    }
}

impl Schema for ObjectSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, input: Value) -> Result<Value, ValidationError> {
        let mut object = match input {
            Value::Object(map) => map,
            other => {
                return Err(ValidationError::new(
                    &self.name,
                    format!("expected an object, found {}", json_type_name(&other)),
                ))
            }
        };

        let mut coerced = Map::new();
        for rule in &self.fields {
            match object.remove(&rule.name) {
                None | Some(Value::Null) if rule.required => {
                    return Err(ValidationError::new(
                        &self.name,
                        format!("missing required field '{}'", rule.name),
                    ));
                }
                None => {}
                Some(Value::Null) => {
                    coerced.insert(rule.name.clone(), Value::Null);
                }
                Some(value) => {
                    if !rule.kind.accepts(&value) {
                        return Err(ValidationError::new(
                            &self.name,
                            format!(
                                "field '{}' expected {:?}, found {}",
                                rule.name,
                                rule.kind,
                                json_type_name(&value)
                            ),
                        ));
                    }
                    coerced.insert(rule.name.clone(), value);
                }
            }
        }

        Ok(Value::Object(coerced))
    }
}

/// Human-readable JSON type name
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
