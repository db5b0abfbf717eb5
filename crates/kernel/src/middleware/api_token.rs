//! API token authentication middleware.
//!
//! Checks for `Authorization: Bearer <token>` headers and attaches the
//! resolved [`Principal`] to the request extensions. Requests without a
//! header proceed as the anonymous principal.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::permissions::Principal;
use crate::state::AppState;

/// Middleware that authenticates via Bearer token.
///
/// - Valid token -> inserts the token's principal
/// - Unknown token -> returns 401 JSON error
/// - No header, or a non-Bearer scheme -> inserts the anonymous principal
pub async fn authenticate_api_token(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let raw_token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let principal = match raw_token {
        None => Principal::anonymous(),
        Some(raw) => match state.tokens().lookup(raw) {
            Some(principal) => principal,
            None => {
                tracing::debug!(path = %request.uri().path(), "rejected unknown API token");
                return (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(json!({"error": "Invalid API token"})),
                )
                    .into_response();
            }
        },
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}
