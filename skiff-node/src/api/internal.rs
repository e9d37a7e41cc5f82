//! Peer API Handlers
//!
//! Endpoints secondaries call on the primary: the registration handshake
//! and the heartbeat.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use skiff_core::dto::node::{NodeSummary, RegisterNode};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{JsonBody, PathParams};
use crate::auth::RequestScope;
use crate::state::AppState;

/// POST /internal/nodes/register
/// Register (or re-register) a secondary with the primary
pub async fn register_node(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(req): JsonBody<RegisterNode>,
) -> ApiResult<Json<NodeSummary>> {
    state.authenticator.authenticate_registration(&headers).await?;

    if !state.config.is_primary() {
        return Err(ApiError::Validation(
            "only the primary accepts registrations".to_string(),
        ));
    }
    if req.id == state.config.node_id {
        return Err(ApiError::Validation(format!(
            "node id {} belongs to the primary",
            req.id
        )));
    }

    tracing::info!("Registering node {} ({}) at {}", req.id, req.name, req.api_endpoint);
    let node = state.registry.register(req).await?;
    Ok(Json(node.into()))
}

/// POST /internal/nodes/{id}/heartbeat
/// Record that a secondary is alive
///
/// Only the node itself may beat for its id.
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    PathParams(id): PathParams<String>,
) -> ApiResult<StatusCode> {
    match &scope {
        RequestScope::Local(caller) if *caller == id && id != state.config.node_id => {}
        _ => {
            return Err(ApiError::Unauthorized(format!(
                "heartbeats for {} require that node's credentials",
                id
            )));
        }
    }

    tracing::debug!("Heartbeat from node: {}", id);
    state.registry.record_heartbeat(&id).await?;
    Ok(StatusCode::OK)
}
