//! Entity storage backends.
//!
//! Provides the [`EntityStore`] trait and two implementations: an in-memory
//! store that runs the query engine directly, and a Postgres store that
//! translates queries to SQL.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::entity::{Document, EntitySchema};
use crate::query::{QueryError, QueryRequest, QueryResult};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record {0} already exists")]
    Conflict(Uuid),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Storage backend for entity documents, keyed by entity name and id.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Store a new document. Assigns the next insertion sequence number.
    async fn insert(&self, entity: &str, id: Uuid, document: Document) -> Result<(), StoreError>;

    async fn get(&self, entity: &str, id: Uuid) -> Result<Option<Document>, StoreError>;

    /// Overwrite a document, keeping its insertion position.
    ///
    /// Returns `false` when no such record exists.
    async fn replace(&self, entity: &str, id: Uuid, document: Document) -> Result<bool, StoreError>;

    /// Returns `false` when no such record exists.
    async fn delete(&self, entity: &str, id: Uuid) -> Result<bool, StoreError>;

    /// Run a list query over one entity type's documents.
    async fn query(
        &self,
        schema: &EntitySchema,
        request: &QueryRequest,
    ) -> Result<QueryResult<Document>, QueryError>;

    async fn healthy(&self) -> bool;

    /// Backend name (e.g., "memory", "postgres").
    fn backend(&self) -> &'static str;
}
