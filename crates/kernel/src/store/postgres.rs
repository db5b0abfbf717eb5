//! Postgres entity store.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::debug;
use uuid::Uuid;

use super::{EntityStore, StoreError};
use crate::entity::{Document, EntitySchema};
use crate::query::{EntityQueryBuilder, Predicate, QueryError, QueryRequest, QueryResult, SortKey};

/// Store backed by the `entity_records` table.
pub struct PgStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }
}

fn unavailable(e: sqlx::Error) -> QueryError {
    QueryError::SourceUnavailable(e.to_string())
}

#[async_trait]
impl EntityStore for PgStore {
    async fn insert(&self, entity: &str, id: Uuid, document: Document) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO entity_records (entity, id, document) VALUES ($1, $2, $3) \
             ON CONFLICT (entity, id) DO NOTHING",
        )
        .bind(entity)
        .bind(id)
        .bind(Json(&document))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(id));
        }
        debug!(entity = %entity, id = %id, "record inserted");
        Ok(())
    }

    async fn get(&self, entity: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
        let document: Option<Json<Document>> = sqlx::query_scalar(
            "SELECT document FROM entity_records WHERE entity = $1 AND id = $2",
        )
        .bind(entity)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(document.map(|Json(d)| d))
    }

    async fn replace(&self, entity: &str, id: Uuid, document: Document) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE entity_records SET document = $3 WHERE entity = $1 AND id = $2")
                .bind(entity)
                .bind(id)
                .bind(Json(&document))
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, entity: &str, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM entity_records WHERE entity = $1 AND id = $2")
            .bind(entity)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(
        &self,
        schema: &EntitySchema,
        request: &QueryRequest,
    ) -> Result<QueryResult<Document>, QueryError> {
        // Same validation order as the in-memory engine.
        let paging = request.paging()?;
        let predicate = Predicate::compile(schema, &request.filters, request.effective_search())?;
        let sort = SortKey::resolve(schema, request)?;

        let builder = EntityQueryBuilder::new(&schema.name, &predicate, sort.as_ref());
        let count_sql = builder.build_count();
        let page_sql = builder.build(paging);

        // SET LOCAL applies to this transaction only and resets on commit/rollback.
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.query_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        let total: i64 = sqlx::query_scalar(&count_sql)
            .fetch_one(&mut *tx)
            .await
            .map_err(unavailable)?;

        let rows: Vec<Json<Document>> = sqlx::query_scalar(&page_sql)
            .fetch_all(&mut *tx)
            .await
            .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;

        let items = rows.into_iter().map(|Json(d)| d).collect();
        Ok(QueryResult::new(
            items,
            total.unsigned_abs(),
            request.page_number,
            request.page_size,
        ))
    }

    async fn healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
