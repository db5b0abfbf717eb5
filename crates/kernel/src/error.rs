//! Application error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::query::QueryError;
use crate::services::EntityError;
use crate::store::StoreError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    BadRequest(String),

    /// Backing store failure. The detail is logged, never returned.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::SourceUnavailable(detail) => AppError::Unavailable(detail),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<EntityError> for AppError {
    fn from(e: EntityError) -> Self {
        match e {
            EntityError::NotFound { .. } => AppError::NotFound(e.to_string()),
            EntityError::Invalid(_) | EntityError::IdMismatch => AppError::BadRequest(e.to_string()),
            EntityError::Query(q) => q.into(),
            EntityError::Store(StoreError::Unavailable(detail)) => AppError::Unavailable(detail),
            EntityError::Store(conflict @ StoreError::Conflict(_)) => {
                AppError::Internal(anyhow::Error::new(conflict))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            AppError::Unavailable(detail) => {
                tracing::error!(error = %detail, "store unavailable");
                "internal server error".to_string()
            }
            _ => {
                tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
                self.to_string()
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
