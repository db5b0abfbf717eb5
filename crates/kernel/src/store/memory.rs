//! In-memory entity store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{EntityStore, StoreError};
use crate::entity::{Document, EntitySchema, Record};
use crate::query::{QueryEngine, QueryError, QueryRequest, QueryResult};

/// Process-local store. Data is lost on restart.
///
/// Queries run under a read lock, so each call sees a consistent snapshot.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_seq: u64,
    collections: HashMap<String, Collection>,
}

#[derive(Default)]
struct Collection {
    /// Records by insertion sequence.
    records: BTreeMap<u64, Record>,
    index: HashMap<Uuid, u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Number of records stored for an entity type.
    pub fn count(&self, entity: &str) -> usize {
        self.inner
            .read()
            .collections
            .get(entity)
            .map_or(0, |c| c.records.len())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert(&self, entity: &str, id: Uuid, document: Document) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.next_seq += 1;
        let seq = inner.next_seq;

        let collection = inner.collections.entry(entity.to_string()).or_default();
        if collection.index.contains_key(&id) {
            return Err(StoreError::Conflict(id));
        }
        collection.index.insert(id, seq);
        collection.records.insert(seq, Record { seq, document });

        debug!(entity = %entity, id = %id, seq, "record inserted");
        Ok(())
    }

    async fn get(&self, entity: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.read();
        let document = inner.collections.get(entity).and_then(|c| {
            c.index
                .get(&id)
                .and_then(|seq| c.records.get(seq))
                .map(|r| r.document.clone())
        });
        Ok(document)
    }

    async fn replace(&self, entity: &str, id: Uuid, document: Document) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let Some(collection) = inner.collections.get_mut(entity) else {
            return Ok(false);
        };
        let Some(record) = collection
            .index
            .get(&id)
            .copied()
            .and_then(|seq| collection.records.get_mut(&seq))
        else {
            return Ok(false);
        };
        record.document = document;
        Ok(true)
    }

    async fn delete(&self, entity: &str, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let Some(collection) = inner.collections.get_mut(entity) else {
            return Ok(false);
        };
        match collection.index.remove(&id) {
            Some(seq) => {
                collection.records.remove(&seq);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn query(
        &self,
        schema: &EntitySchema,
        request: &QueryRequest,
    ) -> Result<QueryResult<Document>, QueryError> {
        let inner = self.inner.read();
        match inner.collections.get(&schema.name) {
            Some(collection) => QueryEngine::execute(schema, collection.records.values(), request),
            None => QueryEngine::execute(schema, std::iter::empty(), request),
        }
    }

    async fn healthy(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::entity::{FieldDefinition, FieldType};
    use crate::query::SortDirection;
    use serde_json::json;

    fn schema() -> EntitySchema {
        EntitySchema::new(
            "students",
            "Student",
            vec![FieldDefinition {
                name: "Name".to_string(),
                field_type: FieldType::String,
                required: true,
                searchable: true,
                system: false,
            }],
        )
    }

    fn doc(name: &str) -> Document {
        json!({ "Name": name }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn crud_round() {
        let store = MemoryStore::new();
        let id = Uuid::now_v7();

        store.insert("students", id, doc("Ada")).await.unwrap();
        assert_eq!(store.get("students", id).await.unwrap(), Some(doc("Ada")));
        assert_eq!(store.get("teachers", id).await.unwrap(), None);

        assert!(store.replace("students", id, doc("Grace")).await.unwrap());
        assert_eq!(store.get("students", id).await.unwrap(), Some(doc("Grace")));

        assert!(store.delete("students", id).await.unwrap());
        assert!(!store.delete("students", id).await.unwrap());
        assert!(!store.replace("students", id, doc("x")).await.unwrap());
        assert_eq!(store.count("students"), 0);
    }

    #[tokio::test]
    async fn duplicate_ids_conflict() {
        let store = MemoryStore::new();
        let id = Uuid::now_v7();
        store.insert("students", id, doc("Ada")).await.unwrap();
        let err = store.insert("students", id, doc("Ada")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(conflict) if conflict == id));
    }

    #[tokio::test]
    async fn replace_keeps_insertion_position() {
        let store = MemoryStore::new();
        let first = Uuid::now_v7();
        store.insert("students", first, doc("Ada")).await.unwrap();
        store.insert("students", Uuid::now_v7(), doc("Bob")).await.unwrap();
        store.replace("students", first, doc("Zed")).await.unwrap();

        let result = store.query(&schema(), &QueryRequest::new(1, 10)).await.unwrap();
        assert_eq!(result.items[0]["Name"], json!("Zed"));
    }

    #[tokio::test]
    async fn query_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        let request = QueryRequest::new(1, 10).sorted_by("Name", SortDirection::Desc);
        let result = store.query(&schema(), &request).await.unwrap();
        assert_eq!(result.total_count, 0);
        assert!(result.items.is_empty());
    }

    #[tokio::test]
    async fn query_validates_even_when_empty() {
        let store = MemoryStore::new();
        let err = store.query(&schema(), &QueryRequest::new(1, 0)).await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
    }
}
