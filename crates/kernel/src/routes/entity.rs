//! Generic entity routes.
//!
//! One set of handlers serves every registered entity type under
//! `/api/{entity}`. The capability layer resolves the schema before a
//! handler runs and hands it over as a request extension.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::entity::{Document, EntitySchema, PatchOperation};
use crate::error::{AppError, AppResult};
use crate::middleware::require_entity_capability;
use crate::query::{QueryRequest, QueryResult, SortDirection, parse_filters};
use crate::state::AppState;

/// List query string parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// JSON array of filter criteria.
    pub filters: Option<String>,
    pub search_term: Option<String>,
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
}

impl ListParams {
    /// Build a query request, applying page size defaults and the cap.
    pub fn into_request(
        self,
        default_page_size: i64,
        max_page_size: i64,
    ) -> AppResult<QueryRequest> {
        let filters = parse_filters(self.filters.as_deref())?;
        let sort_order = SortDirection::parse(self.sort_order.as_deref())?;

        let mut page_size = self.page_size.unwrap_or(default_page_size);
        if page_size > max_page_size {
            tracing::warn!(
                requested = page_size,
                max = max_page_size,
                "page size capped"
            );
            page_size = max_page_size;
        }

        Ok(QueryRequest {
            filters,
            search_term: self.search_term,
            page_number: self.page_number.unwrap_or(1),
            page_size,
            sort_field: self.sort_field.filter(|f| !f.trim().is_empty()),
            sort_order,
        })
    }
}

/// Create the entity router.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/{entity}", get(list).post(create))
        .route(
            "/api/{entity}/{id}",
            get(get_one).put(update).patch(patch).delete(delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            require_entity_capability,
        ))
}

/// Parse a path id. A malformed id cannot name an existing record.
fn parse_id(schema: &EntitySchema, raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(format!("{} {raw} not found", schema.name)))
}

fn body_error(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

async fn create(
    State(state): State<AppState>,
    Extension(schema): Extension<Arc<EntitySchema>>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = body.map_err(body_error)?;
    let id = state.entities().create(&schema, body).await?;
    Ok(Json(json!({ "id": id })))
}

async fn list(
    State(state): State<AppState>,
    Extension(schema): Extension<Arc<EntitySchema>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<Json<QueryResult<Document>>> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let request = params.into_request(state.default_page_size(), state.max_page_size())?;
    let result = state.entities().list(&schema, &request).await?;
    Ok(Json(result))
}

async fn get_one(
    State(state): State<AppState>,
    Extension(schema): Extension<Arc<EntitySchema>>,
    Path((_, id)): Path<(String, String)>,
) -> AppResult<Json<Document>> {
    let id = parse_id(&schema, &id)?;
    let document = state.entities().get(&schema, id).await?;
    Ok(Json(document))
}

async fn update(
    State(state): State<AppState>,
    Extension(schema): Extension<Arc<EntitySchema>>,
    Path((_, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&schema, &id)?;
    let Json(body) = body.map_err(body_error)?;
    state.entities().update(&schema, id, body).await?;
    Ok(Json(json!({ "status": "updated" })))
}

async fn patch(
    State(state): State<AppState>,
    Extension(schema): Extension<Arc<EntitySchema>>,
    Path((_, id)): Path<(String, String)>,
    body: Result<Json<Vec<PatchOperation>>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&schema, &id)?;
    let Json(operations) = body.map_err(|e| {
        AppError::BadRequest(format!("patch document missing or malformed: {}", e.body_text()))
    })?;
    state.entities().patch(&schema, id, &operations).await?;
    Ok(Json(json!({ "status": "patched" })))
}

async fn delete(
    State(state): State<AppState>,
    Extension(schema): Extension<Arc<EntitySchema>>,
    Path((_, id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&schema, &id)?;
    state.entities().delete(&schema, id).await?;
    Ok(Json(json!({ "status": "deleted" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn list_params_defaults() {
        let request = ListParams::default().into_request(10, 100).unwrap();
        assert_eq!(request.page_number, 1);
        assert_eq!(request.page_size, 10);
        assert!(request.filters.is_empty());
        assert_eq!(request.sort_field, None);
        assert_eq!(request.sort_order, SortDirection::Asc);
    }

    #[test]
    fn page_size_is_capped() {
        let params = ListParams {
            page_size: Some(5000),
            ..ListParams::default()
        };
        assert_eq!(params.into_request(10, 100).unwrap().page_size, 100);
    }

    #[test]
    fn non_positive_page_size_is_left_for_validation() {
        let params = ListParams {
            page_size: Some(0),
            ..ListParams::default()
        };
        assert_eq!(params.into_request(10, 100).unwrap().page_size, 0);
    }

    #[test]
    fn malformed_filters_are_bad_requests() {
        let params = ListParams {
            filters: Some("[{\"PropertyName\":".to_string()),
            ..ListParams::default()
        };
        let err = params.into_request(10, 100).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let params = ListParams {
            sort_order: Some("sideways".to_string()),
            ..ListParams::default()
        };
        assert!(matches!(
            params.into_request(10, 100).unwrap_err(),
            AppError::BadRequest(_)
        ));
    }
}
