//! Collection and history endpoints.
//!
//! # Data Flow
//! ```text
//! request
//!     → security::identity (x-user-uid, else 400 VALIDATION)
//!     → handler (path ids, body fields)
//!     → storage::Store (owner-scoped)
//!     → {error:false, data} | ApiError (400 / 404 / 500)
//! ```

pub mod collections;
pub mod error;
pub mod history;
pub mod items;

use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::http::server::AppState;
use self::error::ApiError;

pub fn setup_api_router() -> Router<AppState> {
    Router::new()
        .route("/collections", get(collections::list).post(collections::create))
        .route("/collections/{id}", patch(collections::rename).delete(collections::remove))
        .route("/collections/{id}/items", get(items::list).post(items::create))
        .route("/collections/{id}/items/{item_id}", patch(items::update).delete(items::remove))
        .route("/history", get(history::list).delete(history::clear))
        .route("/history/{id}", delete(history::remove))
}

/// `{"error": false, "data": ...}`
pub(crate) fn data<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "error": false, "data": data }))
}

/// Parse a request body as a JSON object. An empty body is an empty object.
pub(crate) fn json_object(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ApiError::Validation("Request body must be a JSON object".into())),
    }
}

/// Hyphenated UUIDs only.
pub(crate) fn parse_uuid(raw: &str) -> Option<Uuid> {
    if raw.len() != 36 {
        return None;
    }
    Uuid::parse_str(raw).ok()
}
