//! App API Handlers
//!
//! Apps are the routed resource: each one lives on a single node. Calls
//! naming another node are forwarded there in one hop; lists fan out.

use axum::{
    Extension, Json,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use skiff_core::domain::app::App;
use skiff_core::dto::app::{AppAction, CreateApp, FanOutList};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{JsonBody, PathParams, QueryParams};
use crate::api::passthrough;
use crate::auth::RequestScope;
use crate::routing::{NodeSelection, Route};
use crate::service::validate_identifier;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NodeQuery {
    pub node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListAppsQuery {
    /// `all` or a comma separated list of node ids
    pub node_ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub node_id: Option<String>,
    pub limit: Option<u32>,
}

/// Ids end up in forwarded paths, so they are checked before routing
fn checked_id(id: &str) -> ApiResult<&str> {
    validate_identifier("app id", id).map_err(ApiError::Validation)?;
    Ok(id)
}

// =============================================================================
// Listing
// =============================================================================

/// GET /apps?node_ids=all|a,b
/// List apps across nodes
///
/// Peer and gateway callers only ever see the receiving node's apps.
pub async fn list_apps(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    QueryParams(query): QueryParams<ListAppsQuery>,
) -> ApiResult<Json<FanOutList<App>>> {
    if scope.is_local() {
        let items = state.apps.list().await?;
        return Ok(Json(FanOutList {
            items,
            excluded_nodes: 0,
            errors: Vec::new(),
        }));
    }

    let selection = NodeSelection::parse(query.node_ids.as_deref());
    tracing::debug!("Listing apps on {:?}", selection);

    let apps = state.apps.clone();
    let list = state
        .router
        .fan_out(&selection, "/apps", || {
            let apps = apps.clone();
            async move {
                apps.list().await.map_err(|e| {
                    tracing::error!("Failed to list local apps: {}", e);
                    "failed to list apps".to_string()
                })
            }
        })
        .await?;

    Ok(Json(list))
}

// =============================================================================
// Targeted App Operations
// =============================================================================

/// POST /apps?node_id=
/// Create an app on a node
pub async fn create_app(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    QueryParams(query): QueryParams<NodeQuery>,
    JsonBody(req): JsonBody<CreateApp>,
) -> ApiResult<Response> {
    match state.router.route(&scope, query.node_id.as_deref()).await? {
        Route::Local => {
            tracing::info!("Creating app: {}", req.name);
            let app = state.apps.create(req).await?;
            Ok((StatusCode::CREATED, Json(app)).into_response())
        }
        Route::Remote(node) => {
            let body = serde_json::to_value(&req)
                .map_err(|e| ApiError::Internal(format!("Failed to encode app request: {}", e)))?;
            let raw = state
                .router
                .forward(&node, Method::POST, "/apps", Some(&body))
                .await?;
            Ok(passthrough(raw))
        }
    }
}

/// GET /apps/{id}?node_id=
pub async fn get_app(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    PathParams(id): PathParams<String>,
    QueryParams(query): QueryParams<NodeQuery>,
) -> ApiResult<Response> {
    let id = checked_id(&id)?;

    match state.router.route(&scope, query.node_id.as_deref()).await? {
        Route::Local => Ok(Json(state.apps.get(id).await?).into_response()),
        Route::Remote(node) => {
            let path = format!("/apps/{}", id);
            let raw = state.router.forward(&node, Method::GET, &path, None).await?;
            Ok(passthrough(raw))
        }
    }
}

/// DELETE /apps/{id}?node_id=
/// Remove an app record; its job history stays
pub async fn delete_app(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    PathParams(id): PathParams<String>,
    QueryParams(query): QueryParams<NodeQuery>,
) -> ApiResult<Response> {
    let id = checked_id(&id)?;

    match state.router.route(&scope, query.node_id.as_deref()).await? {
        Route::Local => {
            tracing::info!("Deleting app: {}", id);
            state.apps.delete(id).await?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Route::Remote(node) => {
            let path = format!("/apps/{}", id);
            let raw = state
                .router
                .forward(&node, Method::DELETE, &path, None)
                .await?;
            Ok(passthrough(raw))
        }
    }
}

/// POST /apps/{id}/{action}?node_id=
/// Queue a deploy, stop, restart or rebuild and return the job to poll
pub async fn trigger_action(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    PathParams((id, action)): PathParams<(String, String)>,
    QueryParams(query): QueryParams<NodeQuery>,
) -> ApiResult<Response> {
    let id = checked_id(&id)?;
    let action: AppAction = action.parse().map_err(ApiError::Validation)?;

    match state.router.route(&scope, query.node_id.as_deref()).await? {
        Route::Local => {
            let job = state.apps.trigger(id, action).await?;
            tracing::info!("Queued {} of app {} as job {}", action, id, job.id);
            Ok((StatusCode::ACCEPTED, Json(job)).into_response())
        }
        Route::Remote(node) => {
            let path = format!("/apps/{}/{}", id, action);
            let raw = state.router.forward(&node, Method::POST, &path, None).await?;
            Ok(passthrough(raw))
        }
    }
}

/// GET /apps/{id}/jobs?node_id=&limit=
/// Bounded job history of an app, newest first
pub async fn list_app_jobs(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    PathParams(id): PathParams<String>,
    QueryParams(query): QueryParams<JobsQuery>,
) -> ApiResult<Response> {
    let id = checked_id(&id)?;

    match state.router.route(&scope, query.node_id.as_deref()).await? {
        Route::Local => Ok(Json(state.apps.jobs(id, query.limit).await?).into_response()),
        Route::Remote(node) => {
            let path = match query.limit {
                Some(limit) => format!("/apps/{}/jobs?limit={}", id, limit),
                None => format!("/apps/{}/jobs", id),
            };
            let raw = state.router.forward(&node, Method::GET, &path, None).await?;
            Ok(passthrough(raw))
        }
    }
}
