//! Schema-driven decoding of raw MQTT payloads into typed records.
//!
//! Wire field names are matched against a [`SchemaDescriptor`] case-insensitively, with
//! per-field aliases, and rewritten to their canonical names before the typed
//! deserialization step. Required fields are checked up front so that a missing field is
//! always reported by name, and a record is either fully decoded or not produced at all.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::Record;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("missing required field: {0}")]
    MissingRequiredField(String),
    #[error("invalid field value: {0}")]
    InvalidField(String),
}

/// Mapping rule for one wire field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Canonical wire name, which is also the name the typed record deserializes from.
    pub name: &'static str,
    /// Alternative wire names accepted for this field.
    pub aliases: &'static [&'static str],
    pub required: bool,
    /// Schema applied to the field's value when it is a JSON object.
    pub nested: Option<&'static SchemaDescriptor>,
}

impl FieldSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            required: true,
            nested: None,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            required: false,
            nested: None,
        }
    }

    pub const fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub const fn nested(mut self, schema: &'static SchemaDescriptor) -> Self {
        self.nested = Some(schema);
        self
    }

    pub fn matches(&self, key: &str) -> bool {
        key.eq_ignore_ascii_case(self.name)
            || self.aliases.iter().any(|alias| key.eq_ignore_ascii_case(alias))
    }
}

/// The wire schema of one payload shape.
#[derive(Debug)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

/// Decode a raw payload into the record type `R`, using `R::schema()` for field mapping.
pub fn decode<R: Record>(payload: &[u8]) -> Result<R, DecodeError> {
    let canonical = decode_with(payload, R::schema())?;

    serde_json::from_value(Value::Object(canonical))
        .map_err(|e| DecodeError::InvalidField(e.to_string()))
}

/// Parse a raw payload and map it onto `schema`, returning the object keyed by canonical
/// field names. Unknown fields are dropped.
pub fn decode_with(
    payload: &[u8],
    schema: &SchemaDescriptor,
) -> Result<Map<String, Value>, DecodeError> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| DecodeError::Malformed(format!("payload is not valid UTF-8: {e}")))?;

    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let Value::Object(object) = value else {
        return Err(DecodeError::Malformed(format!(
            "expected a JSON object for {}",
            schema.name
        )));
    };

    canonicalize(object, schema, None)
}

fn canonicalize(
    object: Map<String, Value>,
    schema: &SchemaDescriptor,
    path: Option<&str>,
) -> Result<Map<String, Value>, DecodeError> {
    let mut slots: Vec<Option<Value>> = vec![None; schema.fields.len()];

    for (key, value) in object {
        let Some(index) = schema.fields.iter().position(|field| field.matches(&key)) else {
            continue;
        };
        // An exact canonical name wins over an alias or a differently-cased duplicate.
        let exact = key == schema.fields[index].name;
        if slots[index].is_none() || exact {
            slots[index] = Some(value);
        }
    }

    let mut canonical = Map::with_capacity(schema.fields.len());
    for (field, slot) in schema.fields.iter().zip(slots) {
        let field_path = match path {
            Some(parent) => format!("{parent}.{}", field.name),
            None => field.name.to_owned(),
        };

        let value = match slot {
            None | Some(Value::Null) if field.required => {
                return Err(DecodeError::MissingRequiredField(field_path));
            }
            None => continue,
            Some(Value::Object(inner)) => match field.nested {
                Some(nested) => Value::Object(canonicalize(inner, nested, Some(&field_path))?),
                None => Value::Object(inner),
            },
            Some(value) => value,
        };

        drop(canonical.insert(field.name.to_owned(), value));
    }

    Ok(canonical)
}
