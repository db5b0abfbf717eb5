//! Per-entity capability checks.
//!
//! Runs as a route layer on the generic entity routes, after routing, so
//! the `{entity}` path parameter is available. On success the resolved
//! schema is attached to the request for the handler.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Method, Request},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::permissions::{Capability, Principal};
use crate::state::AppState;

/// The capability an HTTP method exercises on an entity.
pub fn capability_for_method(method: &Method) -> Option<Capability> {
    match *method {
        Method::POST => Some(Capability::Create),
        Method::GET | Method::HEAD => Some(Capability::Read),
        Method::PUT | Method::PATCH => Some(Capability::Update),
        Method::DELETE => Some(Capability::Delete),
        _ => None,
    }
}

/// Resolve the entity type and check the caller's capability.
///
/// 404 for an unknown entity type, 405 when the type does not offer the
/// action, 401 when the principal lacks it.
pub async fn require_entity_capability(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let name = params.get("entity").map(String::as_str).unwrap_or_default();
    let schema = state
        .registry()
        .get(name)
        .ok_or_else(|| AppError::NotFound(format!("unknown entity type '{name}'")))?;

    let capability = capability_for_method(request.method()).ok_or_else(|| {
        AppError::MethodNotAllowed(format!("{} is not supported", request.method()))
    })?;

    if !schema.supports(capability) {
        return Err(AppError::MethodNotAllowed(format!(
            "{} does not support {capability}",
            schema.name
        )));
    }

    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or_else(Principal::anonymous);

    if !state
        .permissions()
        .principal_can(&principal, capability, &schema.name)
    {
        tracing::debug!(
            principal = %principal.name,
            entity = %schema.name,
            capability = %capability,
            "capability denied"
        );
        let message = if principal.is_anonymous() {
            "authentication required".to_string()
        } else {
            format!("missing {capability} capability on {}", schema.name)
        };
        return Err(AppError::Unauthorized(message));
    }

    request.extensions_mut().insert(schema);
    Ok(next.run(request).await)
}
