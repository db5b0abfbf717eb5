//! HTTP route handlers.

pub mod catalog;
pub mod entity;
pub mod health;
pub mod metrics;

use axum::Router;

use crate::state::AppState;

/// Build the application router with authentication and metrics layers.
///
/// CORS and request tracing are added by the binary.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(metrics::router())
        .merge(catalog::router())
        .merge(entity::router(state.clone()))
        // Middleware layers (last added = first executed in request flow):
        // track_metrics → api_token → routes
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::authenticate_api_token,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::track_metrics,
        ))
        .with_state(state)
}
