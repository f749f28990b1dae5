//! Collection and history endpoints, exercised in-process.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use rest_relay::config::RelayConfig;
use rest_relay::http::HttpServer;
use rest_relay::storage::{MemoryStore, NewHistoryEntry, Store};

struct App {
    router: Router,
    store: Arc<MemoryStore>,
}

fn app() -> App {
    let store = Arc::new(MemoryStore::new(None));
    let server = HttpServer::new(RelayConfig::default(), store.clone()).unwrap();
    App { router: server.router(), store }
}

impl App {
    async fn call(&self, method: Method, uri: &str, uid: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(uid) = uid {
            builder = builder.header("x-user-uid", uid);
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

#[tokio::test]
async fn identity_is_required() {
    let app = app();
    for (method, uri) in [
        (Method::GET, "/collections"),
        (Method::POST, "/collections"),
        (Method::GET, "/history"),
        (Method::DELETE, "/history"),
    ] {
        let (status, body) = app.call(method, uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["errorType"], "VALIDATION");
        assert_eq!(body["message"], "Missing or invalid x-user-uid header");
    }

    let (status, _) = app.call(Method::GET, "/collections", Some("  "), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn collection_crud() {
    let app = app();

    let (status, body) = app
        .call(Method::POST, "/collections", Some("alice"), Some(json!({ "name": "  Payments  " })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["error"], false);
    assert_eq!(body["data"]["name"], "Payments");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app.call(Method::GET, "/collections", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = app.call(Method::GET, "/collections", Some("bob"), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = app
        .call(Method::PATCH, &format!("/collections/{id}"), Some("alice"), Some(json!({ "name": "Billing" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Billing");

    let (status, body) = app
        .call(Method::PATCH, &format!("/collections/{id}"), Some("bob"), Some(json!({ "name": "Mine" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorType"], "NOT_FOUND");

    let (status, body) = app.call(Method::DELETE, &format!("/collections/{id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "id": id, "deleted": true }));

    let (status, _) = app.call(Method::DELETE, &format!("/collections/{id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn collection_validation() {
    let app = app();

    for body in [json!({}), json!({ "name": "   " }), json!({ "name": 7 })] {
        let (status, body) = app.call(Method::POST, "/collections", Some("alice"), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Collection name is required");
    }

    let (status, body) = app
        .call(Method::PATCH, "/collections/not-a-uuid", Some("alice"), Some(json!({ "name": "x" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid collection ID");
}

#[tokio::test]
async fn item_crud() {
    let app = app();
    let collection = app.store.create_collection("alice", "Saved").await.unwrap();
    let base = format!("/collections/{}/items", collection.id);

    let (status, body) = app
        .call(
            Method::POST,
            &base,
            Some("alice"),
            Some(json!({
                "url": " https://api.example.com/users ",
                "method": "post",
                "headers": { "content-type": "application/json" },
                "body": { "name": "ada" },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let item = body["data"].clone();
    assert_eq!(item["url"], "https://api.example.com/users");
    assert_eq!(item["method"], "POST");
    assert_eq!(item["body"], json!({ "name": "ada" }));
    let item_id = item["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("{base}/{item_id}"),
            Some("alice"),
            Some(json!({ "method": "put", "body": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["method"], "PUT");
    assert_eq!(body["data"]["body"], Value::Null);
    assert_eq!(body["data"]["headers"], json!({ "content-type": "application/json" }));
    assert_eq!(body["data"]["url"], "https://api.example.com/users");

    let (_, body) = app.call(Method::GET, &base, Some("alice"), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app.call(Method::GET, &base, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call(Method::DELETE, &format!("{base}/{item_id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);

    let (status, body) = app.call(Method::DELETE, &format!("{base}/{item_id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Item not found");
}

#[tokio::test]
async fn item_validation() {
    let app = app();
    let collection = app.store.create_collection("alice", "Saved").await.unwrap();
    let base = format!("/collections/{}/items", collection.id);

    let (status, body) = app
        .call(Method::POST, &base, Some("alice"), Some(json!({ "url": "nope", "method": "GET" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid URL");

    let (status, body) = app
        .call(Method::POST, &base, Some("alice"), Some(json!({ "url": "http://a.example/", "method": "BREW" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid HTTP method");

    let (status, body) = app
        .call(Method::DELETE, &format!("{base}/12345"), Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid ID(s)");
}

#[tokio::test]
async fn deleting_collection_removes_its_items() {
    let app = app();
    let collection = app.store.create_collection("alice", "Temp").await.unwrap();
    let base = format!("/collections/{}/items", collection.id);
    app.call(Method::POST, &base, Some("alice"), Some(json!({ "url": "http://a.example/", "method": "GET" })))
        .await;

    app.call(Method::DELETE, &format!("/collections/{}", collection.id), Some("alice"), None)
        .await;

    let again = app.store.create_collection("alice", "Other").await.unwrap();
    assert!(app.store.list_items("alice", again.id).await.unwrap().is_empty());
    assert!(app.store.list_items("alice", collection.id).await.is_err());
}

fn entry(owner: &str, url: &str) -> NewHistoryEntry {
    NewHistoryEntry {
        user_uid: owner.into(),
        url: url.into(),
        method: "GET".into(),
        headers: json!({}),
        body: Value::Null,
        status: 200,
        time_ms: 5,
    }
}

#[tokio::test]
async fn history_endpoints() {
    let app = app();
    let first = app.store.insert_history(entry("alice", "http://h/1")).await.unwrap();
    app.store.insert_history(entry("alice", "http://h/2")).await.unwrap();
    app.store.insert_history(entry("bob", "http://h/3")).await.unwrap();

    let (status, body) = app.call(Method::GET, "/history", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    let urls: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["url"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(urls, ["http://h/2", "http://h/1"]);

    let (status, _) = app.call(Method::DELETE, &format!("/history/{}", first.id), Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call(Method::DELETE, &format!("/history/{}", first.id), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deleted": true, "id": first.id.to_string() }));

    let (status, _) = app.call(Method::DELETE, "/history/garbage", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call(Method::DELETE, "/history", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "cleared": true, "count": 1 }));

    assert_eq!(app.store.list_history("bob", 10).await.unwrap().len(), 1);
}
