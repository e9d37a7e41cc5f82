//! Node API Handlers
//!
//! Manual membership management and on-demand health probes. Responses use
//! [`NodeSummary`] so stored keys never leave the node.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use skiff_core::dto::node::{CreateNode, NodeHealth, NodeSummary, UpdateNode};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{JsonBody, PathParams};
use crate::state::AppState;

// =============================================================================
// Membership
// =============================================================================

/// GET /nodes
/// List every registered node, primary first
pub async fn list_nodes(State(state): State<AppState>) -> ApiResult<Json<Vec<NodeSummary>>> {
    tracing::debug!("Listing nodes");

    let nodes = state.registry.list().await?;
    Ok(Json(nodes.into_iter().map(NodeSummary::from).collect()))
}

/// POST /nodes
/// Add a node by hand
pub async fn create_node(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateNode>,
) -> ApiResult<(StatusCode, Json<NodeSummary>)> {
    tracing::info!("Adding node: {}", req.name);

    let node = state.registry.add(req).await?;
    Ok((StatusCode::CREATED, Json(node.into())))
}

/// GET /nodes/{id}
pub async fn get_node(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
) -> ApiResult<Json<NodeSummary>> {
    let node = state.registry.get(&id).await?;
    Ok(Json(node.into()))
}

/// PUT /nodes/{id}
/// Rename, re-key, move, disable or re-enable a node
pub async fn update_node(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    JsonBody(req): JsonBody<UpdateNode>,
) -> ApiResult<Json<NodeSummary>> {
    tracing::info!("Updating node: {}", id);

    let node = state.registry.apply_update(&id, req).await?;
    Ok(Json(node.into()))
}

/// DELETE /nodes/{id}
pub async fn delete_node(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
) -> ApiResult<StatusCode> {
    if id == state.config.node_id {
        return Err(ApiError::Validation(
            "a node cannot remove its own registry entry".to_string(),
        ));
    }

    tracing::info!("Removing node: {}", id);
    state.registry.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Health
// =============================================================================

/// GET /nodes/{id}/health
/// Probe a node now and record the outcome
pub async fn check_node_health(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
) -> ApiResult<Json<NodeHealth>> {
    let node = state.registry.get(&id).await?;
    let health = state.prober.check(&node).await?;

    tracing::debug!("Node {} health: {}", id, health.status);
    Ok(Json(health))
}
