//! Authentication middleware
//!
//! Runs the tiered authenticator on every protected route and stores the
//! resulting [`RequestScope`](super::RequestScope) in the request extensions.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::error::ApiError;
use crate::state::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let scope = state.authenticator.authenticate(request.headers()).await?;
    tracing::debug!(?scope, path = %request.uri().path(), "Request authenticated");

    request.extensions_mut().insert(scope);
    Ok(next.run(request).await)
}
