//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::entity::{Catalog, EntityRegistry};
use crate::metrics::Metrics;
use crate::models::TokenRegistry;
use crate::permissions::PermissionService;
use crate::services::EntityService;
use crate::store::{EntityStore, MemoryStore, PgStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Registered entity types.
    registry: EntityRegistry,

    /// CRUD and list operations over the configured store.
    entities: EntityService,

    /// Bearer tokens by digest.
    tokens: TokenRegistry,

    /// Capability checks.
    permissions: PermissionService,

    /// Prometheus metrics.
    metrics: Arc<Metrics>,

    default_page_size: i64,
    max_page_size: i64,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// Connects to Postgres and runs migrations when `DATABASE_URL` is set,
    /// otherwise uses the in-memory store.
    pub async fn new(config: &Config) -> Result<Self> {
        let catalog = match &config.entity_catalog {
            Some(path) => Catalog::from_file(path)?,
            None => Catalog::builtin()?,
        };
        info!(entities = catalog.entities.len(), "entity catalog loaded");

        let store: Arc<dyn EntityStore> = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url, config.database_max_connections).await?;
                info!("database pool created");
                db::run_migrations(&pool).await?;
                info!("database migrations applied");
                Arc::new(PgStore::new(pool, config.query_timeout))
            }
            None => {
                info!("DATABASE_URL not set, using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let mut tokens = match &config.api_tokens_file {
            Some(path) => TokenRegistry::from_file(path)?,
            None => TokenRegistry::new(),
        };
        if let Some(raw) = &config.admin_token {
            tokens = tokens
                .with_admin_token(raw)
                .context("failed to register ADMIN_TOKEN")?;
        }
        if tokens.is_empty() {
            tracing::warn!("no API tokens configured; every entity route will return 401");
        } else {
            info!(tokens = tokens.len(), "API tokens loaded");
        }

        Ok(Self::from_parts(config, catalog, store, tokens))
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(
        config: &Config,
        catalog: Catalog,
        store: Arc<dyn EntityStore>,
        tokens: TokenRegistry,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());
        Self {
            inner: Arc::new(AppStateInner {
                registry: EntityRegistry::from_catalog(catalog),
                entities: EntityService::new(store, Arc::clone(&metrics)),
                tokens,
                permissions: PermissionService::new(),
                metrics,
                default_page_size: config.default_page_size,
                max_page_size: config.max_page_size,
            }),
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.inner.registry
    }

    pub fn entities(&self) -> &EntityService {
        &self.inner.entities
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.inner.tokens
    }

    pub fn permissions(&self) -> &PermissionService {
        &self.inner.permissions
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    pub fn default_page_size(&self) -> i64 {
        self.inner.default_page_size
    }

    pub fn max_page_size(&self) -> i64 {
        self.inner.max_page_size
    }

    /// Check if the backing store is reachable.
    pub async fn store_healthy(&self) -> bool {
        self.inner.entities.store().healthy().await
    }

    pub fn store_backend(&self) -> &'static str {
        self.inner.entities.store().backend()
    }
}
