use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{json, Map, Value};

use super::error::ApiError;
use super::{data, json_object, parse_uuid};
use crate::http::server::AppState;
use crate::security::Identity;

fn collection_id(raw: &str) -> Result<uuid::Uuid, ApiError> {
    parse_uuid(raw).ok_or_else(|| ApiError::Validation("Invalid collection ID".into()))
}

fn required_name(fields: &Map<String, Value>) -> Result<String, ApiError> {
    match fields.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => Ok(name.trim().to_string()),
        _ => Err(ApiError::Validation("Collection name is required".into())),
    }
}

pub async fn create(
    State(state): State<AppState>,
    Identity(owner): Identity,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let name = required_name(&json_object(&body)?)?;
    let collection = state.store.create_collection(&owner, &name).await?;
    tracing::info!(id = %collection.id, "Collection created");
    Ok((StatusCode::CREATED, data(collection)))
}

pub async fn list(
    State(state): State<AppState>,
    Identity(owner): Identity,
) -> Result<impl IntoResponse, ApiError> {
    Ok(data(state.store.list_collections(&owner).await?))
}

pub async fn rename(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = collection_id(&id)?;
    let name = required_name(&json_object(&body)?)?;
    Ok(data(state.store.rename_collection(&owner, id, &name).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = collection_id(&id)?;
    state.store.delete_collection(&owner, id).await?;
    tracing::info!(id = %id, "Collection deleted");
    Ok(data(json!({ "id": id, "deleted": true })))
}
