//! Targeted routing: calls for this node never leave it, calls for another
//! node take exactly one hop with that node's peer credentials.

mod common;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use common::*;
use reqwest::Client;
use serde_json::{Value, json};
use skiff_core::dto::app::CreateApp;
use skiff_core::dto::node::CreateNode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct StubNode {
    hits: Arc<AtomicUsize>,
    seen_node_ids: Arc<Mutex<Vec<String>>>,
}

async fn stub_get_app(
    State(stub): State<StubNode>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    let caller = headers
        .get("x-node-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    stub.seen_node_ids.lock().unwrap().push(caller);

    if id == "blog" {
        (StatusCode::OK, Json(json!({ "id": "blog", "served_by": "stub" })))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "not_found", "detail": format!("App {} not found", id) })),
        )
    }
}

async fn primary_with_stub() -> (TestNode, StubNode) {
    let primary = spawn_node(primary_config("primary")).await;

    let stub = StubNode::default();
    let stub_url = spawn_stub(
        Router::new()
            .route("/apps/{id}", get(stub_get_app))
            .with_state(stub.clone()),
    )
    .await;

    primary
        .state
        .registry
        .add(CreateNode {
            id: Some("worker-1".to_string()),
            name: "worker-1".to_string(),
            api_endpoint: stub_url,
            api_key: "worker-1-key".to_string(),
            is_primary: false,
        })
        .await
        .unwrap();

    (primary, stub)
}

#[tokio::test]
async fn test_remote_node_is_one_hop_with_peer_credentials() {
    let (primary, stub) = primary_with_stub().await;

    let response = Client::new()
        .get(primary.http("/apps/blog?node_id=worker-1"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["served_by"], "stub");

    assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    assert_eq!(*stub.seen_node_ids.lock().unwrap(), vec!["worker-1"]);
}

#[tokio::test]
async fn test_own_node_never_hops() {
    let (primary, stub) = primary_with_stub().await;
    primary
        .state
        .apps
        .create(CreateApp {
            id: Some("blog".to_string()),
            name: "blog".to_string(),
            compose_file: None,
        })
        .await
        .unwrap();

    let app = primary.user().get_app("blog", "primary").await.unwrap();
    assert_eq!(app.node_id, "primary");
    assert_eq!(stub.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_peer_calls_are_never_forwarded_again() {
    let (primary, stub) = primary_with_stub().await;

    // worker-1's own credentials: the call is about the primary's data, so
    // node_id is ignored and nothing is forwarded back
    let response = Client::new()
        .get(primary.http("/apps/blog?node_id=worker-1"))
        .header("x-node-id", "worker-1")
        .header("x-node-api-key", "worker-1-key")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(stub.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upstream_errors_pass_through() {
    let (primary, _stub) = primary_with_stub().await;

    let response = Client::new()
        .get(primary.http("/apps/missing?node_id=worker-1"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "App missing not found");
}

#[tokio::test]
async fn test_user_calls_must_name_a_node() {
    let (primary, _stub) = primary_with_stub().await;

    let response = Client::new()
        .get(primary.http("/apps/blog"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn test_unknown_and_dead_nodes() {
    let primary = spawn_node(primary_config("primary")).await;
    primary
        .state
        .registry
        .add(CreateNode {
            id: Some("gone".to_string()),
            name: "gone".to_string(),
            api_endpoint: dead_endpoint().await,
            api_key: "gone-key".to_string(),
            is_primary: false,
        })
        .await
        .unwrap();

    let client = Client::new();

    let unknown = client
        .get(primary.http("/apps/blog?node_id=nowhere"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let dead = client
        .get(primary.http("/apps/blog?node_id=gone"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(dead.status(), StatusCode::BAD_GATEWAY);
    let body: Value = dead.json().await.unwrap();
    assert_eq!(body["error"], "upstream_unreachable");
    assert_eq!(body["node_id"], "gone");
}
