//! Saved requests inside a collection.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

use super::error::ApiError;
use super::{data, json_object, parse_uuid};
use crate::history::sanitize_for_storage;
use crate::http::server::AppState;
use crate::relay::request::parse_method;
use crate::security::Identity;
use crate::storage::{CollectionItemPatch, NewCollectionItem};

fn ids(collection_id: &str, item_id: &str) -> Result<(Uuid, Uuid), ApiError> {
    match (parse_uuid(collection_id), parse_uuid(item_id)) {
        (Some(c), Some(i)) => Ok((c, i)),
        _ => Err(ApiError::Validation("Invalid ID(s)".into())),
    }
}

fn url_field(value: Option<&Value>) -> Result<String, ApiError> {
    match value {
        Some(Value::String(url)) if Url::parse(url.trim()).is_ok() => Ok(url.trim().to_string()),
        _ => Err(ApiError::Validation("Invalid URL".into())),
    }
}

fn method_field(value: Option<&Value>) -> Result<String, ApiError> {
    match value {
        Some(Value::String(method)) => parse_method(method)
            .map(|m| m.to_string())
            .map_err(|_| ApiError::Validation("Invalid HTTP method".into())),
        _ => Err(ApiError::Validation("Invalid HTTP method".into())),
    }
}

/// Null and empty strings count as "not supplied" in a patch.
fn supplied(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        other => other,
    }
}

pub async fn create(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Path(collection_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let collection_id =
        parse_uuid(&collection_id).ok_or_else(|| ApiError::Validation("Invalid collection ID".into()))?;
    let fields = json_object(&body)?;
    let url = url_field(fields.get("url"))?;
    let method = method_field(fields.get("method"))?;

    let limit = state.settings.load().history.max_value_bytes;
    let item = NewCollectionItem {
        url,
        method,
        headers: sanitize_for_storage(fields.get("headers"), limit),
        body: sanitize_for_storage(fields.get("body"), limit),
    };

    let item = state.store.add_item(&owner, collection_id, item).await?;
    tracing::info!(id = %item.id, collection_id = %collection_id, "Collection item added");
    Ok((StatusCode::CREATED, data(item)))
}

pub async fn list(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Path(collection_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let collection_id =
        parse_uuid(&collection_id).ok_or_else(|| ApiError::Validation("Invalid collection ID".into()))?;
    Ok(data(state.store.list_items(&owner, collection_id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Path((collection_id, item_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let (collection_id, item_id) = ids(&collection_id, &item_id)?;
    let fields = json_object(&body)?;
    let limit = state.settings.load().history.max_value_bytes;

    let patch = CollectionItemPatch {
        url: supplied(fields.get("url")).map(|v| url_field(Some(v))).transpose()?,
        method: supplied(fields.get("method")).map(|v| method_field(Some(v))).transpose()?,
        headers: fields.get("headers").map(|v| sanitize_for_storage(Some(v), limit)),
        body: fields.get("body").map(|v| sanitize_for_storage(Some(v), limit)),
    };

    Ok(data(state.store.update_item(&owner, collection_id, item_id, patch).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Path((collection_id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let (collection_id, item_id) = ids(&collection_id, &item_id)?;
    state.store.delete_item(&owner, collection_id, item_id).await?;
    Ok(data(json!({ "id": item_id, "deleted": true })))
}
