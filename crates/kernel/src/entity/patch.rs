//! JSON Patch over entity documents.
//!
//! Documents are flat, so a path names exactly one field: `/FieldName`
//! (with `~1` for `/` and `~0` for `~`). Operations are applied in order to
//! a copy; the caller validates the result before writing it.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::document::Document;
use super::schema::EntitySchema;

/// One patch operation.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch document is empty")]
    Empty,

    #[error("invalid patch path '{0}'")]
    InvalidPath(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{0}' is read-only")]
    ReadOnly(String),

    #[error("field '{0}' does not exist")]
    MissingTarget(String),

    #[error("test failed for field '{0}'")]
    TestFailed(String),
}

/// Apply operations to a copy of `document`.
///
/// The first failing operation aborts the whole patch.
pub fn apply_patch(
    schema: &EntitySchema,
    document: &Document,
    operations: &[PatchOperation],
) -> Result<Document, PatchError> {
    if operations.is_empty() {
        return Err(PatchError::Empty);
    }

    let mut patched = document.clone();
    for operation in operations {
        apply_one(schema, &mut patched, operation)?;
    }
    Ok(patched)
}

fn apply_one(
    schema: &EntitySchema,
    doc: &mut Document,
    operation: &PatchOperation,
) -> Result<(), PatchError> {
    match operation {
        PatchOperation::Add { path, value } => {
            let field = writable(schema, path)?;
            doc.insert(field, value.clone());
        }
        PatchOperation::Remove { path } => {
            let field = writable(schema, path)?;
            doc.remove(&field).ok_or(PatchError::MissingTarget(field))?;
        }
        PatchOperation::Replace { path, value } => {
            let field = writable(schema, path)?;
            let slot = doc.get_mut(&field).ok_or(PatchError::MissingTarget(field))?;
            *slot = value.clone();
        }
        PatchOperation::Move { from, path } => {
            let source = writable(schema, from)?;
            let target = writable(schema, path)?;
            let value = doc
                .remove(&source)
                .ok_or_else(|| PatchError::MissingTarget(source.clone()))?;
            doc.insert(target, value);
        }
        PatchOperation::Copy { from, path } => {
            let source = readable(schema, from)?;
            let target = writable(schema, path)?;
            let value = doc
                .get(&source)
                .cloned()
                .ok_or(PatchError::MissingTarget(source))?;
            doc.insert(target, value);
        }
        PatchOperation::Test { path, value } => {
            let field = readable(schema, path)?;
            let actual = doc.get(&field).unwrap_or(&Value::Null);
            if actual != value {
                return Err(PatchError::TestFailed(field));
            }
        }
    }
    Ok(())
}

/// Resolve a path to a schema field name.
fn readable(schema: &EntitySchema, path: &str) -> Result<String, PatchError> {
    let name = path
        .strip_prefix('/')
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
        .ok_or_else(|| PatchError::InvalidPath(path.to_string()))?
        .replace("~1", "/")
        .replace("~0", "~");

    if schema.field(&name).is_none() {
        return Err(PatchError::UnknownField(name));
    }
    Ok(name)
}

/// Resolve a path that the operation writes to.
fn writable(schema: &EntitySchema, path: &str) -> Result<String, PatchError> {
    let name = readable(schema, path)?;
    if schema.field(&name).is_some_and(|f| f.system) {
        return Err(PatchError::ReadOnly(name));
    }
    Ok(name)
}
