//! Job API Handlers
//!
//! Job status polling. Jobs live on the node that runs them.

use axum::{
    Extension, Json,
    extract::State,
    http::Method,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::extract::{PathParams, QueryParams};
use crate::api::passthrough;
use crate::auth::RequestScope;
use crate::routing::Route;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    pub node_id: Option<String>,
}

/// GET /jobs/{id}?node_id=
/// Poll a job's status and progress
pub async fn get_job(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    PathParams(id): PathParams<Uuid>,
    QueryParams(query): QueryParams<JobQuery>,
) -> ApiResult<Response> {
    match state.router.route(&scope, query.node_id.as_deref()).await? {
        Route::Local => {
            let job = state.jobs.get(id).await?;
            Ok(Json(job).into_response())
        }
        Route::Remote(node) => {
            let path = format!("/jobs/{}", id);
            let raw = state.router.forward(&node, Method::GET, &path, None).await?;
            Ok(passthrough(raw))
        }
    }
}
