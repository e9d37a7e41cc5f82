//! Health and status handlers
//!
//! `/health` is an unauthenticated reachability probe. `/status` always
//! describes the receiving node, whoever asks.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use skiff_core::dto::node::NodeStatusReport;

use crate::state::AppState;

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /status
/// What this node reports about itself
pub async fn node_status(State(state): State<AppState>) -> Json<NodeStatusReport> {
    Json(NodeStatusReport {
        node_id: state.config.node_id.clone(),
        name: state.config.node_name.clone(),
        is_primary: state.config.is_primary(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        registration: *state.registration.borrow(),
        heartbeat: state.heartbeat.borrow().clone(),
    })
}
