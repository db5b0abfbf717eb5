//! Entity catalog endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;

use crate::entity::{EntitySchema, FieldDefinition};
use crate::error::{AppError, AppResult};
use crate::permissions::{Capability, Principal};
use crate::query::FilterOperator;
use crate::state::AppState;

/// Public description of one entity type.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    pub name: String,
    pub label: String,
    pub capabilities: Vec<Capability>,
    pub operators: Vec<FilterOperator>,
    pub fields: Vec<FieldDefinition>,
    pub searchable_fields: Vec<String>,
}

impl From<&EntitySchema> for EntitySummary {
    fn from(schema: &EntitySchema) -> Self {
        Self {
            name: schema.name.clone(),
            label: schema.label.clone(),
            capabilities: schema.capabilities.clone(),
            operators: schema.operators.clone(),
            fields: schema.fields.clone(),
            searchable_fields: schema.searchable_fields().map(|f| f.name.clone()).collect(),
        }
    }
}

/// Create the catalog router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/entities", get(list_entities))
}

/// List registered entity types. Any authenticated principal may call this.
async fn list_entities(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Vec<EntitySummary>>> {
    if principal.is_anonymous() {
        return Err(AppError::Unauthorized("authentication required".to_string()));
    }

    let entities = state
        .registry()
        .list()
        .iter()
        .map(|schema| EntitySummary::from(schema.as_ref()))
        .collect();
    Ok(Json(entities))
}
