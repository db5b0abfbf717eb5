//! Entity documents and write-time validation.

use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::schema::{EntitySchema, FieldType, ID_FIELD};
use crate::query::{FieldValue, format_date, parse_date};

/// An entity instance: field name to JSON value.
pub type Document = Map<String, Value>;

/// A stored document with its insertion sequence number.
///
/// `seq` is assigned by the store, strictly increasing, and serves as the
/// stable fallback ordering for queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub seq: u64,
    pub document: Document,
}

/// Reasons a request body is not a valid document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{0}' is required")]
    MissingField(String),

    #[error("field '{field}' must be a {expected}")]
    InvalidValue { field: String, expected: FieldType },

    #[error("Id in body does not match the resource id")]
    IdMismatch,
}

/// Validate a client-supplied body and normalize it for storage.
///
/// System fields in the body are dropped, except that a present `Id` must
/// equal `expected_id` when one is given. Every writable field of the
/// schema appears in the result; omitted optional fields become `null`.
pub fn normalize_document(
    schema: &EntitySchema,
    body: Value,
    expected_id: Option<Uuid>,
) -> Result<Document, DocumentError> {
    let Value::Object(mut body) = body else {
        return Err(DocumentError::NotAnObject);
    };

    if let Some(id) = body.get(ID_FIELD)
        && !id.is_null()
        && let Some(expected) = expected_id
    {
        let matches = id
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .is_some_and(|id| id == expected);
        if !matches {
            return Err(DocumentError::IdMismatch);
        }
    }

    if let Some(unknown) = body.keys().find(|name| schema.field(name).is_none()) {
        return Err(DocumentError::UnknownField(unknown.clone()));
    }

    let mut document = Document::new();
    for field in schema.writable_fields() {
        let value = body.remove(&field.name).unwrap_or(Value::Null);
        if value.is_null() {
            if field.required {
                return Err(DocumentError::MissingField(field.name.clone()));
            }
            document.insert(field.name.clone(), Value::Null);
            continue;
        }

        let normalized = normalize_value(&value, field.field_type).ok_or_else(|| {
            DocumentError::InvalidValue {
                field: field.name.clone(),
                expected: field.field_type,
            }
        })?;
        document.insert(field.name.clone(), normalized);
    }

    Ok(document)
}

/// Canonical stored form of a non-null value, or `None` on a type mismatch.
fn normalize_value(value: &Value, field_type: FieldType) -> Option<Value> {
    match field_type {
        FieldType::String => value.as_str().map(|_| value.clone()),
        FieldType::Integer => match FieldValue::read(Some(value), FieldType::Integer) {
            FieldValue::Integer(i) => Some(Value::from(i)),
            _ => None,
        },
        FieldType::Float => value.as_f64().map(|_| value.clone()),
        FieldType::Boolean => value.as_bool().map(Value::Bool),
        FieldType::Date => value
            .as_str()
            .and_then(parse_date)
            .map(|d| Value::String(format_date(&d))),
        FieldType::Uuid => value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(|u| Value::String(u.to_string())),
    }
}
