//! Local stand-ins for etcd and the discovery service.

#![allow(dead_code)]

use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// `None` marks a directory.
pub type Keys = Arc<Mutex<HashMap<String, Option<String>>>>;

/// Path that always answers with a permission error.
pub const FORBIDDEN: &str = "/forbidden";
/// Path that always answers with a non-JSON server error.
pub const BROKEN: &str = "/broken";

pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Starts a minimal etcd v2 keys API and returns its base URL with the shared key map.
pub async fn spawn_etcd() -> (String, Keys) {
    let keys = Keys::default();
    let app = Router::new()
        .route(
            "/v2/keys/{*path}",
            get(get_key).put(put_key).delete(delete_key),
        )
        .with_state(keys.clone());
    (spawn(app).await, keys)
}

fn not_found(key: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"errorCode": 100, "message": "Key not found", "cause": key, "index": 1})),
    )
}

fn special(key: &str) -> Option<(StatusCode, Json<Value>)> {
    match key {
        FORBIDDEN => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "errorCode": 110,
                "message": "The request requires user authentication",
                "cause": "Insufficient credentials",
                "index": 1
            })),
        )),
        BROKEN => Some((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!("raft: leader unavailable")),
        )),
        _ => None,
    }
}

async fn get_key(State(keys): State<Keys>, Path(path): Path<String>) -> (StatusCode, Json<Value>) {
    let key = format!("/{path}");
    if let Some(response) = special(&key) {
        return response;
    }
    match keys.lock().unwrap().get(&key) {
        Some(Some(value)) => (
            StatusCode::OK,
            Json(json!({
                "action": "get",
                "node": {"key": key, "value": value, "modifiedIndex": 2, "createdIndex": 2}
            })),
        ),
        Some(None) => (
            StatusCode::OK,
            Json(json!({
                "action": "get",
                "node": {"key": key, "dir": true, "nodes": [], "modifiedIndex": 2, "createdIndex": 2}
            })),
        ),
        None => not_found(&key),
    }
}

async fn put_key(
    State(keys): State<Keys>,
    Path(path): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let key = format!("/{path}");
    if let Some(response) = special(&key) {
        return response;
    }
    let value = form.get("value").cloned().unwrap_or_default();
    keys.lock().unwrap().insert(key.clone(), Some(value.clone()));
    (
        StatusCode::CREATED,
        Json(json!({
            "action": "set",
            "node": {"key": key, "value": value, "modifiedIndex": 3, "createdIndex": 3}
        })),
    )
}

async fn delete_key(
    State(keys): State<Keys>,
    Path(path): Path<String>,
) -> (StatusCode, Json<Value>) {
    let key = format!("/{path}");
    if let Some(response) = special(&key) {
        return response;
    }
    match keys.lock().unwrap().remove(&key) {
        Some(_) => (
            StatusCode::OK,
            Json(json!({"action": "delete", "node": {"key": key, "modifiedIndex": 4}})),
        ),
        None => not_found(&key),
    }
}

/// Starts a discovery service: `/new?size=n` answers with a token URL and a trailing newline,
/// `/down` always fails.
pub async fn spawn_discovery() -> String {
    let app = Router::new()
        .route("/new", get(new_token))
        .route("/down", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }));
    spawn(app).await
}

async fn new_token(Query(query): Query<HashMap<String, String>>) -> String {
    let size = query.get("size").cloned().unwrap_or_default();
    format!("  https://discovery.etcd.io/token-{size}\n")
}
