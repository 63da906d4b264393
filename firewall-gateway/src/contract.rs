//! Declarative input contracts for operations.
//!
//! A contract is a table of fields (type, constraints, optionality,
//! default). One engine renders it as JSON Schema, fills defaults,
//! validates with `jsonschema`, and deserializes into the handler's typed
//! input struct.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::error::{GatewayError, Result};
use crate::ids::ID_PATTERN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Boolean,
}

impl FieldType {
    fn schema_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// 32-char lowercase hex provider identifier
    ResourceId,
    MaxLength(usize),
    Range { min: i64, max: i64 },
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<Value>,
    pub constraints: Vec<Constraint>,
}

impl FieldSpec {
    fn new(name: &'static str, field_type: FieldType, description: &'static str) -> Self {
        Self {
            name,
            field_type,
            description,
            required: true,
            default: None,
            constraints: Vec::new(),
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldType::String, description)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldType::Integer, description)
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldType::Boolean, description)
    }

    /// Shorthand for a required identifier field
    pub fn id(name: &'static str, description: &'static str) -> Self {
        Self::string(name, description).resource_id()
    }

    pub fn resource_id(mut self) -> Self {
        self.constraints.push(Constraint::ResourceId);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.constraints.push(Constraint::MaxLength(max));
        self
    }

    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.constraints.push(Constraint::Range { min, max });
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.constraints.push(Constraint::OneOf(values));
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Optional field filled with `value` when absent
    pub fn default(mut self, value: Value) -> Self {
        self.required = false;
        self.default = Some(value);
        self
    }

    fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.field_type.schema_name()));
        schema.insert("description".into(), json!(self.description));
        for constraint in &self.constraints {
            match constraint {
                Constraint::ResourceId => {
                    schema.insert("pattern".into(), json!(ID_PATTERN));
                }
                Constraint::MaxLength(max) => {
                    schema.insert("maxLength".into(), json!(max));
                }
                Constraint::Range { min, max } => {
                    schema.insert("minimum".into(), json!(min));
                    schema.insert("maximum".into(), json!(max));
                }
                Constraint::OneOf(values) => {
                    schema.insert("enum".into(), json!(values));
                }
            }
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        Value::Object(schema)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputContract {
    fields: Vec<FieldSpec>,
}

impl InputContract {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// JSON Schema for the whole input object
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Fill defaults and validate. Returns the normalized input object.
    pub fn validate(&self, input: &Value) -> Result<Value> {
        let mut object = match input {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            _ => return Err(GatewayError::validation("input must be a JSON object")),
        };

        for field in &self.fields {
            let missing = object.get(field.name).map_or(true, Value::is_null);
            if !missing || field.required {
                continue;
            }
            match &field.default {
                Some(default) => {
                    object.insert(field.name.to_string(), default.clone());
                }
                None => {
                    object.remove(field.name);
                }
            }
        }
        let normalized = Value::Object(object);

        let schema = self.json_schema();
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| GatewayError::validation(format!("invalid input contract: {e}")))?;
        if let Err(error) = validator.validate(&normalized) {
            return Err(GatewayError::validation(format!("invalid input: {error}")));
        }

        Ok(normalized)
    }

    /// Validate, then deserialize into the handler's input type
    pub fn parse<T: DeserializeOwned>(&self, input: &Value) -> Result<T> {
        let normalized = self.validate(input)?;
        serde_json::from_value(normalized)
            .map_err(|e| GatewayError::validation(format!("invalid input: {e}")))
    }
}
