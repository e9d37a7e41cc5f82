//! Malformed requests answer with the same error body as every other failure.

mod common;

use common::*;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

async fn assert_validation(response: Response) -> Value {
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("application/json"), "{}", content_type);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "validation");
    assert!(body["detail"].is_string());
    body
}

#[tokio::test]
async fn test_bad_job_id_is_a_validation_error() {
    let primary = spawn_node(primary_config("primary")).await;

    let response = Client::new()
        .get(primary.http("/jobs/not-a-uuid?node_id=primary"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap();

    let body = assert_validation(response).await;
    assert!(!body["detail"].as_str().unwrap().contains("UUID parsing failed"));
}

#[tokio::test]
async fn test_malformed_json_body_is_a_validation_error() {
    let primary = spawn_node(primary_config("primary")).await;

    let response = Client::new()
        .post(primary.http("/nodes"))
        .bearer_auth(USER_TOKEN)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    let body = assert_validation(response).await;
    assert_eq!(body["detail"], "request body is not valid JSON");
}

#[tokio::test]
async fn test_missing_fields_are_a_validation_error() {
    let primary = spawn_node(primary_config("primary")).await;

    let response = Client::new()
        .put(primary.http("/nodes/primary"))
        .bearer_auth(USER_TOKEN)
        .header("content-type", "application/json")
        .body(r#"{"name": 42}"#)
        .send()
        .await
        .unwrap();

    assert_validation(response).await;
}

#[tokio::test]
async fn test_bad_query_value_is_a_validation_error() {
    let primary = spawn_node(primary_config("primary")).await;

    let response = Client::new()
        .get(primary.http("/apps/blog/jobs?node_id=primary&limit=lots"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap();

    let body = assert_validation(response).await;
    assert_eq!(body["detail"], "invalid query string");
}
