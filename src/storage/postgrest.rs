//! PostgREST-backed store.
//!
//! Tables: `history`, `collections`, `collection_items`. Rows are created
//! with client-side ids and timestamps and echoed back with
//! `Prefer: return=representation`; an empty representation from an
//! update or delete means nothing matched.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{
    Collection, CollectionItem, CollectionItemPatch, Entity, HistoryEntry, NewCollectionItem,
    NewHistoryEntry, Store, StoreError, StoreResult,
};
use crate::config::PostgrestConfig;

const HISTORY: &str = "history";
const COLLECTIONS: &str = "collections";
const ITEMS: &str = "collection_items";
const NEWEST_FIRST: (&str, &str) = ("order", "created_at.desc");

pub struct PostgrestStore {
    client: reqwest::Client,
    base: String,
}

impl PostgrestStore {
    pub fn new(config: &PostgrestConfig) -> StoreResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&config.api_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", config.api_key))?);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, table: &str) -> String {
        format!("{}/{}", self.base, table)
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> StoreResult<Vec<T>> {
        let response = self.client.get(self.url(table)).query(query).send().await?;
        rows(response).await
    }

    async fn insert<B: Serialize, T: DeserializeOwned>(&self, table: &str, row: &B) -> StoreResult<T> {
        let response = self
            .client
            .post(self.url(table))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(format!("insert into {table} returned no rows")))
    }

    async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
        changes: &B,
    ) -> StoreResult<Vec<T>> {
        let response = self
            .client
            .patch(self.url(table))
            .query(query)
            .header("Prefer", "return=representation")
            .json(changes)
            .send()
            .await?;
        rows(response).await
    }

    async fn delete(&self, table: &str, query: &[(&str, String)]) -> StoreResult<usize> {
        let response = self
            .client
            .delete(self.url(table))
            .query(query)
            .query(&[("select", "id")])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Ok(rows::<Value>(response).await?.len())
    }

    async fn ensure_collection(&self, owner: &str, id: Uuid) -> StoreResult<()> {
        let found: Vec<Value> = self
            .select(
                COLLECTIONS,
                &[("select", "id".to_string()), ("id", eq(id)), ("user_uid", eq(owner))],
            )
            .await?;
        if found.is_empty() {
            return Err(StoreError::NotFound(Entity::Collection));
        }
        Ok(())
    }
}

fn header_value(value: &str) -> StoreResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| StoreError::Backend("api key is not a valid header value".into()))
}

fn eq(value: impl Display) -> String {
    format!("eq.{value}")
}

async fn rows<T: DeserializeOwned>(response: reqwest::Response) -> StoreResult<Vec<T>> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(StoreError::Backend(format!("{status}: {text}")));
    }
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl Store for PostgrestStore {
    async fn insert_history(&self, entry: NewHistoryEntry) -> StoreResult<HistoryEntry> {
        self.insert(HISTORY, &entry.into_entry()).await
    }

    async fn list_history(&self, owner: &str, limit: usize) -> StoreResult<Vec<HistoryEntry>> {
        self.select(
            HISTORY,
            &[
                ("user_uid", eq(owner)),
                (NEWEST_FIRST.0, NEWEST_FIRST.1.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn delete_history(&self, owner: &str, id: Uuid) -> StoreResult<()> {
        match self.delete(HISTORY, &[("id", eq(id)), ("user_uid", eq(owner))]).await? {
            0 => Err(StoreError::NotFound(Entity::HistoryEntry)),
            _ => Ok(()),
        }
    }

    async fn clear_history(&self, owner: &str) -> StoreResult<usize> {
        self.delete(HISTORY, &[("user_uid", eq(owner))]).await
    }

    async fn create_collection(&self, owner: &str, name: &str) -> StoreResult<Collection> {
        let collection = Collection {
            id: Uuid::new_v4(),
            user_uid: owner.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.insert(COLLECTIONS, &collection).await
    }

    async fn list_collections(&self, owner: &str) -> StoreResult<Vec<Collection>> {
        self.select(
            COLLECTIONS,
            &[("user_uid", eq(owner)), (NEWEST_FIRST.0, NEWEST_FIRST.1.to_string())],
        )
        .await
    }

    async fn rename_collection(&self, owner: &str, id: Uuid, name: &str) -> StoreResult<Collection> {
        self.update(COLLECTIONS, &[("id", eq(id)), ("user_uid", eq(owner))], &json!({ "name": name }))
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound(Entity::Collection))
    }

    async fn delete_collection(&self, owner: &str, id: Uuid) -> StoreResult<()> {
        self.ensure_collection(owner, id).await?;
        self.delete(ITEMS, &[("collection_id", eq(id))]).await?;
        match self.delete(COLLECTIONS, &[("id", eq(id)), ("user_uid", eq(owner))]).await? {
            0 => Err(StoreError::NotFound(Entity::Collection)),
            _ => Ok(()),
        }
    }

    async fn add_item(
        &self,
        owner: &str,
        collection_id: Uuid,
        item: NewCollectionItem,
    ) -> StoreResult<CollectionItem> {
        self.ensure_collection(owner, collection_id).await?;
        self.insert(ITEMS, &item.into_item(collection_id)).await
    }

    async fn list_items(&self, owner: &str, collection_id: Uuid) -> StoreResult<Vec<CollectionItem>> {
        self.ensure_collection(owner, collection_id).await?;
        self.select(
            ITEMS,
            &[("collection_id", eq(collection_id)), (NEWEST_FIRST.0, NEWEST_FIRST.1.to_string())],
        )
        .await
    }

    async fn update_item(
        &self,
        owner: &str,
        collection_id: Uuid,
        item_id: Uuid,
        patch: CollectionItemPatch,
    ) -> StoreResult<CollectionItem> {
        self.ensure_collection(owner, collection_id).await?;
        let filter = [("id", eq(item_id)), ("collection_id", eq(collection_id))];
        let found: Vec<CollectionItem> = if patch.is_empty() {
            self.select(ITEMS, &filter).await?
        } else {
            self.update(ITEMS, &filter, &patch).await?
        };
        found.into_iter().next().ok_or(StoreError::NotFound(Entity::Item))
    }

    async fn delete_item(&self, owner: &str, collection_id: Uuid, item_id: Uuid) -> StoreResult<()> {
        self.ensure_collection(owner, collection_id).await?;
        match self
            .delete(ITEMS, &[("id", eq(item_id)), ("collection_id", eq(collection_id))])
            .await?
        {
            0 => Err(StoreError::NotFound(Entity::Item)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::body::{to_bytes, Body};
    use axum::extract::State;
    use axum::http::{header, Request, StatusCode};
    use axum::response::IntoResponse;
    use axum::Router;

    #[derive(Debug, Clone)]
    struct Call {
        method: String,
        path: String,
        query: String,
        apikey: Option<String>,
        authorization: Option<String>,
        prefer: Option<String>,
        body: String,
    }

    type Responder = fn(&Call) -> (StatusCode, String);

    #[derive(Clone)]
    struct MockState {
        calls: Arc<Mutex<Vec<Call>>>,
        responder: Responder,
    }

    async fn handle(State(state): State<MockState>, req: Request<Body>) -> impl IntoResponse {
        let (parts, body) = req.into_parts();
        let get = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let body = to_bytes(body, usize::MAX).await.unwrap();
        let call = Call {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().unwrap_or_default().to_string(),
            apikey: get("apikey"),
            authorization: get("authorization"),
            prefer: get("prefer"),
            body: String::from_utf8_lossy(&body).into_owned(),
        };
        let (status, body) = (state.responder)(&call);
        state.calls.lock().unwrap().push(call);
        (status, [(header::CONTENT_TYPE, "application/json")], body)
    }

    async fn mock_postgrest(responder: Responder) -> (PostgrestStore, Arc<Mutex<Vec<Call>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .fallback(handle)
            .with_state(MockState { calls: calls.clone(), responder });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let store = PostgrestStore::new(&PostgrestConfig {
            url: format!("http://{addr}/rest/v1/"),
            api_key: "service-key".into(),
            timeout_secs: 5,
        })
        .unwrap();
        (store, calls)
    }

    fn echo_insert(call: &Call) -> (StatusCode, String) {
        match call.method.as_str() {
            "POST" => (StatusCode::CREATED, format!("[{}]", call.body)),
            _ => (StatusCode::OK, "[]".into()),
        }
    }

    fn sample_history() -> NewHistoryEntry {
        NewHistoryEntry {
            user_uid: "alice".into(),
            url: "https://api.example.com/".into(),
            method: "GET".into(),
            headers: json!({ "content-type": "application/json" }),
            body: json!({ "ok": true }),
            status: 200,
            time_ms: 31,
        }
    }

    #[tokio::test]
    async fn insert_sends_credentials_and_returns_representation() {
        let (store, calls) = mock_postgrest(echo_insert).await;

        let entry = store.insert_history(sample_history()).await.unwrap();
        assert_eq!(entry.user_uid, "alice");
        assert_eq!(entry.status, 200);

        let calls = calls.lock().unwrap();
        let call = &calls[0];
        assert_eq!(call.method, "POST");
        assert_eq!(call.path, "/rest/v1/history");
        assert_eq!(call.apikey.as_deref(), Some("service-key"));
        assert_eq!(call.authorization.as_deref(), Some("Bearer service-key"));
        assert_eq!(call.prefer.as_deref(), Some("return=representation"));
    }

    #[tokio::test]
    async fn list_history_filters_orders_and_limits() {
        let (store, calls) = mock_postgrest(|_| (StatusCode::OK, "[]".into())).await;

        let listed = store.list_history("alice", 100).await.unwrap();
        assert!(listed.is_empty());

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].method, "GET");
        assert_eq!(calls[0].query, "user_uid=eq.alice&order=created_at.desc&limit=100");
    }

    #[tokio::test]
    async fn empty_delete_is_not_found() {
        let (store, _) = mock_postgrest(|_| (StatusCode::OK, "[]".into())).await;
        let err = store.delete_history("alice", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(Entity::HistoryEntry)));
    }

    #[tokio::test]
    async fn clear_counts_returned_rows() {
        let (store, calls) =
            mock_postgrest(|_| (StatusCode::OK, r#"[{"id":"a"},{"id":"b"},{"id":"c"}]"#.into())).await;
        assert_eq!(store.clear_history("alice").await.unwrap(), 3);
        assert_eq!(calls.lock().unwrap()[0].method, "DELETE");
    }

    #[tokio::test]
    async fn items_check_collection_ownership_first() {
        let (store, calls) = mock_postgrest(|_| (StatusCode::OK, "[]".into())).await;
        let err = store.list_items("bob", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(Entity::Collection)));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/rest/v1/collections");
        assert!(calls[0].query.contains("user_uid=eq.bob"));
    }

    #[tokio::test]
    async fn server_errors_become_backend_errors() {
        let (store, _) =
            mock_postgrest(|_| (StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"boom"}"#.into())).await;
        let err = store.list_collections("alice").await.unwrap_err();
        match err {
            StoreError::Backend(message) => assert!(message.contains("500")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
