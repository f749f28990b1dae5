//! Error responses for the collection and history endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::storage::{Entity, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 `VALIDATION`.
    #[error("{0}")]
    Validation(String),

    /// 404 `NOT_FOUND`.
    #[error("{0}")]
    NotFound(String),

    /// 500 `DB_ERROR`; details are logged, not returned.
    #[error("database error: {0}")]
    Database(StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Database(_) => "DB_ERROR",
        }
    }
}

fn not_found_message(entity: Entity) -> &'static str {
    match entity {
        Entity::Collection => "Collection not found or access denied",
        Entity::Item => "Item not found",
        Entity::HistoryEntry => "History entry not found or unauthorized",
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => ApiError::NotFound(not_found_message(entity).to_string()),
            other => ApiError::Database(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Database(e) => {
                tracing::error!(error = %e, "Store operation failed");
                "Database error".to_string()
            }
            other => other.to_string(),
        };
        let body = json!({
            "error": true,
            "message": message,
            "errorType": self.error_type(),
        });
        (self.status(), Json(body)).into_response()
    }
}
