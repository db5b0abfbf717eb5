//! Generic entity service.
//!
//! One service serves every entity type: the schema passed to each call
//! selects validation rules, and the shared store keys records by entity
//! name. System fields (`Id`, `CreatedAt`, `UpdatedAt`) are maintained here.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entity::{
    CREATED_AT_FIELD, Document, DocumentError, EntitySchema, ID_FIELD, PatchError,
    PatchOperation, UPDATED_AT_FIELD, apply_patch, normalize_document,
};
use crate::metrics::Metrics;
use crate::query::{QueryError, QueryRequest, QueryResult, format_date};
use crate::store::{EntityStore, StoreError};

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: Uuid },

    /// Schema validation or patch rejection.
    #[error("{0}")]
    Invalid(String),

    #[error("Id in body does not match the resource id")]
    IdMismatch,

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DocumentError> for EntityError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::IdMismatch => EntityError::IdMismatch,
            other => EntityError::Invalid(other.to_string()),
        }
    }
}

impl From<PatchError> for EntityError {
    fn from(e: PatchError) -> Self {
        EntityError::Invalid(e.to_string())
    }
}

/// Entity CRUD and list operations over a store.
#[derive(Clone)]
pub struct EntityService {
    store: Arc<dyn EntityStore>,
    metrics: Arc<Metrics>,
}

impl EntityService {
    pub fn new(store: Arc<dyn EntityStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Validate and store a new instance. Returns the assigned id.
    pub async fn create(&self, schema: &EntitySchema, body: Value) -> Result<Uuid, EntityError> {
        let fields = normalize_document(schema, body, None)?;

        let id = Uuid::now_v7();
        let now = Value::String(format_date(&Utc::now()));
        let document = stamp(id, now.clone(), now, fields);

        self.store.insert(&schema.name, id, document).await?;
        self.metrics.record_operation(&schema.name, "create");
        info!(entity = %schema.name, id = %id, "entity created");
        Ok(id)
    }

    pub async fn get(&self, schema: &EntitySchema, id: Uuid) -> Result<Document, EntityError> {
        let document = self
            .store
            .get(&schema.name, id)
            .await?
            .ok_or_else(|| not_found(schema, id))?;
        self.metrics.record_operation(&schema.name, "read");
        Ok(document)
    }

    /// Replace every writable field of an existing instance.
    pub async fn update(
        &self,
        schema: &EntitySchema,
        id: Uuid,
        body: Value,
    ) -> Result<(), EntityError> {
        let fields = normalize_document(schema, body, Some(id))?;
        let existing = self
            .store
            .get(&schema.name, id)
            .await?
            .ok_or_else(|| not_found(schema, id))?;

        self.write(schema, id, &existing, fields).await?;
        self.metrics.record_operation(&schema.name, "update");
        info!(entity = %schema.name, id = %id, "entity updated");
        Ok(())
    }

    /// Apply patch operations to an existing instance.
    ///
    /// The patched document must pass the same validation as a full
    /// update; on any failure the stored instance is left untouched.
    pub async fn patch(
        &self,
        schema: &EntitySchema,
        id: Uuid,
        operations: &[PatchOperation],
    ) -> Result<(), EntityError> {
        if operations.is_empty() {
            return Err(PatchError::Empty.into());
        }

        let existing = self
            .store
            .get(&schema.name, id)
            .await?
            .ok_or_else(|| not_found(schema, id))?;

        let patched = apply_patch(schema, &existing, operations)?;
        let fields = normalize_document(schema, Value::Object(patched), Some(id))?;

        self.write(schema, id, &existing, fields).await?;
        self.metrics.record_operation(&schema.name, "patch");
        debug!(entity = %schema.name, id = %id, ops = operations.len(), "entity patched");
        Ok(())
    }

    pub async fn delete(&self, schema: &EntitySchema, id: Uuid) -> Result<(), EntityError> {
        if !self.store.delete(&schema.name, id).await? {
            return Err(not_found(schema, id));
        }
        self.metrics.record_operation(&schema.name, "delete");
        info!(entity = %schema.name, id = %id, "entity deleted");
        Ok(())
    }

    /// Run a list query.
    pub async fn list(
        &self,
        schema: &EntitySchema,
        request: &QueryRequest,
    ) -> Result<QueryResult<Document>, EntityError> {
        let started = Instant::now();
        let result = self.store.query(schema, request).await?;
        self.metrics.record_query(started.elapsed().as_secs_f64());
        self.metrics.record_operation(&schema.name, "list");

        debug!(
            entity = %schema.name,
            total = result.total_count,
            returned = result.items.len(),
            "entity list query"
        );
        Ok(result)
    }

    /// Store new fields, keeping `CreatedAt` from the existing document.
    async fn write(
        &self,
        schema: &EntitySchema,
        id: Uuid,
        existing: &Document,
        fields: Document,
    ) -> Result<(), EntityError> {
        let created = existing.get(CREATED_AT_FIELD).cloned().unwrap_or(Value::Null);
        let now = Value::String(format_date(&Utc::now()));
        let document = stamp(id, created, now, fields);

        // Deleted between read and write.
        if !self.store.replace(&schema.name, id, document).await? {
            return Err(not_found(schema, id));
        }
        Ok(())
    }
}

fn stamp(id: Uuid, created: Value, updated: Value, fields: Document) -> Document {
    let mut document = Document::new();
    document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    document.insert(CREATED_AT_FIELD.to_string(), created);
    document.insert(UPDATED_AT_FIELD.to_string(), updated);
    document.extend(fields);
    document
}

fn not_found(schema: &EntitySchema, id: Uuid) -> EntityError {
    EntityError::NotFound {
        entity: schema.name.clone(),
        id,
    }
}
