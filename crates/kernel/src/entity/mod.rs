//! Entity catalog, schemas, and documents.
//!
//! Entity types are described by configuration (see [`catalog`]) rather
//! than code. Instances are JSON documents validated against their schema.

pub mod catalog;
pub mod document;
pub mod patch;
pub mod registry;
pub mod schema;

pub use catalog::{Catalog, CatalogError};
pub use document::{Document, DocumentError, Record, normalize_document};
pub use patch::{PatchError, PatchOperation, apply_patch};
pub use registry::EntityRegistry;
pub use schema::{
    CREATED_AT_FIELD, EntitySchema, FieldDefinition, FieldType, ID_FIELD, UPDATED_AT_FIELD,
};
