use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use super::error::ApiError;
use super::{data, parse_uuid};
use crate::http::server::AppState;
use crate::security::Identity;
use crate::storage::{Entity, StoreError};

pub async fn list(
    State(state): State<AppState>,
    Identity(owner): Identity,
) -> Result<impl IntoResponse, ApiError> {
    let limit = state.settings.load().history.list_limit;
    Ok(data(state.store.list_history(&owner, limit).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let uuid = parse_uuid(&id).ok_or(StoreError::NotFound(Entity::HistoryEntry))?;
    state.store.delete_history(&owner, uuid).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}

pub async fn clear(
    State(state): State<AppState>,
    Identity(owner): Identity,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.store.clear_history(&owner).await?;
    tracing::info!(count, "History cleared");
    Ok(Json(json!({ "cleared": true, "count": count })))
}
