//! API Module
//!
//! HTTP API layer for the node.
//! Each submodule handles endpoints for a specific domain.

pub mod apps;
pub mod error;
pub mod extract;
pub mod health;
pub mod internal;
pub mod jobs;
pub mod nodes;

use axum::{
    Router,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use skiff_client::RawResponse;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::require_auth;
use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    // Everything below passes the tiered authenticator
    let protected = Router::new()
        // Node status
        .route("/status", get(health::node_status))
        // Node management endpoints
        .route("/nodes", get(nodes::list_nodes).post(nodes::create_node))
        .route(
            "/nodes/{id}",
            get(nodes::get_node)
                .put(nodes::update_node)
                .delete(nodes::delete_node),
        )
        .route("/nodes/{id}/health", get(nodes::check_node_health))
        // Peer endpoints
        .route("/internal/nodes/{id}/heartbeat", post(internal::heartbeat))
        // App endpoints
        .route("/apps", get(apps::list_apps).post(apps::create_app))
        .route("/apps/{id}", get(apps::get_app).delete(apps::delete_app))
        .route("/apps/{id}/jobs", get(apps::list_app_jobs))
        .route("/apps/{id}/{action}", post(apps::trigger_action))
        // Job endpoints
        .route("/jobs/{id}", get(jobs::get_job))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Registration authenticates itself (token or node credentials)
        .route("/internal/nodes/register", post(internal::register_node))
        .merge(protected)
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Answer with a forwarded node's response as-is
pub(crate) fn passthrough(raw: RawResponse) -> Response {
    let status = StatusCode::from_u16(raw.status).unwrap_or(StatusCode::BAD_GATEWAY);
    match raw.content_type {
        Some(content_type) => (status, [(header::CONTENT_TYPE, content_type)], raw.body).into_response(),
        None => (status, raw.body).into_response(),
    }
}
