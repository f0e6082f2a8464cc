//! Runtime-declared record shapes.
//!
//! A [`DynamicSchema`] is built once per run, either from the user's column
//! descriptors or as the fixed product schema, and is used twice: rendered
//! with [`DynamicSchema::json_schema`] to constrain the enrichment
//! collaborator's structured output, then applied with
//! [`DynamicSchema::shape`] to whatever the collaborator returned.

use crate::model::column::{ColumnDescriptor, ColumnType};
use crate::model::product::PRODUCT_FIELDS;
use serde_json::{json, Map, Number, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid column descriptors: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("enrichment output is not a JSON object")]
    NotAnObject,
    #[error("field '{field}' expects a {expected} value, got {found}")]
    Mismatch {
        field: String,
        expected: FieldKind,
        found: &'static str,
    },
}

/// Closed set of value kinds a schema field can hold. Every field is also
/// nullable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
}

impl FieldKind {
    fn json_type(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
        }
    }
}

impl From<ColumnType> for FieldKind {
    fn from(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Number => FieldKind::Number,
            ColumnType::Boolean => FieldKind::Boolean,
            ColumnType::String | ColumnType::Unrecognized => FieldKind::String,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicSchema {
    fields: Vec<SchemaField>,
}

impl DynamicSchema {
    /// Builds the schema from declared columns.
    ///
    /// A name declared twice keeps its first position and the kind of its last
    /// declaration.
    pub fn from_descriptors(columns: &[ColumnDescriptor]) -> Self {
        let mut fields: Vec<SchemaField> = Vec::with_capacity(columns.len());
        for column in columns {
            let kind = FieldKind::from(column.column_type);
            match fields.iter_mut().find(|f| f.name == column.name) {
                Some(existing) => existing.kind = kind,
                None => fields.push(SchemaField {
                    name: column.name.clone(),
                    kind,
                }),
            }
        }
        Self { fields }
    }

    /// Decodes the JSON array of column descriptors sent with an upload.
    pub fn from_json(columns_json: &str) -> Result<Self, SchemaError> {
        let columns: Vec<ColumnDescriptor> = serde_json::from_str(columns_json)?;
        Ok(Self::from_descriptors(&columns))
    }

    /// The fixed product listing schema.
    pub fn product() -> Self {
        Self {
            fields: PRODUCT_FIELDS
                .iter()
                .map(|name| SchemaField {
                    name: (*name).to_string(),
                    kind: FieldKind::String,
                })
                .collect(),
        }
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// JSON-Schema object accepted by strict structured-output endpoints: every
    /// field required but nullable, no extra properties.
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), json!({ "type": [f.kind.json_type(), "null"] })))
            .collect();
        let required: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Reshapes a collaborator result into exactly the declared fields, in
    /// declared order. Absent fields become null and undeclared ones are
    /// dropped.
    ///
    /// Scalars are coerced where the intent is unambiguous (numbers and
    /// booleans into text fields, numeric or boolean text into number and
    /// boolean fields); anything else is a [`SchemaError::Mismatch`].
    pub fn shape(&self, output: Value) -> Result<Map<String, Value>, SchemaError> {
        let Value::Object(mut output) = output else {
            return Err(SchemaError::NotAnObject);
        };

        let mut shaped = Map::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = output.remove(&field.name).unwrap_or(Value::Null);
            let value = coerce(field, value)?;
            shaped.insert(field.name.clone(), value);
        }
        Ok(shaped)
    }
}

fn coerce(field: &SchemaField, value: Value) -> Result<Value, SchemaError> {
    let mismatch = |found: &'static str| SchemaError::Mismatch {
        field: field.name.clone(),
        expected: field.kind,
        found,
    };

    match (field.kind, value) {
        (_, Value::Null) => Ok(Value::Null),
        (FieldKind::String, Value::String(s)) => Ok(Value::String(s)),
        (FieldKind::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (FieldKind::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (FieldKind::Number, Value::Number(n)) => Ok(Value::Number(n)),
        (FieldKind::Number, Value::String(s)) => parse_number(&s)
            .map(Value::Number)
            .ok_or_else(|| mismatch("non-numeric text")),
        (FieldKind::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
        (FieldKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch("non-boolean text")),
        },
        (_, other) => Err(mismatch(kind_name(&other))),
    }
}

// Accepts the Finnish decimal comma as well as the dot.
fn parse_number(text: &str) -> Option<Number> {
    let text = text.trim().replace(',', ".");
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
