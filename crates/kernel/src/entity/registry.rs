//! Entity type registry.
//!
//! Holds the schemas of every registered entity type for fast lookup by
//! path segment. Populated once from the catalog at startup.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::catalog::Catalog;
use super::schema::EntitySchema;

/// Registry of entity types.
#[derive(Clone)]
pub struct EntityRegistry {
    inner: Arc<EntityRegistryInner>,
}

struct EntityRegistryInner {
    schemas: DashMap<String, Arc<EntitySchema>>,
    /// Declaration order, for listings.
    order: Vec<String>,
}

impl EntityRegistry {
    pub fn from_catalog(catalog: Catalog) -> Self {
        let schemas = DashMap::new();
        let mut order = Vec::with_capacity(catalog.entities.len());

        for schema in catalog.entities {
            order.push(schema.name.clone());
            schemas.insert(schema.name.clone(), Arc::new(schema));
        }

        info!(count = order.len(), "entity types registered");

        Self {
            inner: Arc::new(EntityRegistryInner { schemas, order }),
        }
    }

    /// Get a schema by entity name.
    pub fn get(&self, name: &str) -> Option<Arc<EntitySchema>> {
        self.inner.schemas.get(name).map(|r| Arc::clone(r.value()))
    }

    /// All schemas, in catalog order.
    pub fn list(&self) -> Vec<Arc<EntitySchema>> {
        self.inner
            .order
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.order.is_empty()
    }
}
