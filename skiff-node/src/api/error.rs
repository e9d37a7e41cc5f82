//! API Error Handling
//!
//! Unified error types and conversion for API responses. Every failure is
//! answered with `{"error": <category>, "detail": <text>}`; internal details
//! are logged and never sent to the client.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use skiff_core::dto::error::ErrorBody;

use crate::auth::{AuthError, MissingNodeId};
use crate::routing::RouteError;
use crate::service::{AppError, JobQueueError, RegistryError};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    Unauthorized(String),
    /// A forwarded call never reached its node
    UpstreamUnreachable { node_id: String, detail: String },
    /// A forwarded call reached its node, which answered with an error
    Upstream {
        node_id: String,
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    },
    /// Logged in full, answered with a generic message
    Internal(String),
}

impl ApiError {
    fn category(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::NotFound(_) => "not_found",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::UpstreamUnreachable { .. } => "upstream_unreachable",
            ApiError::Upstream { .. } => "upstream_error",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let category = self.category().to_string();

        let (status, detail, node_id) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::UpstreamUnreachable { node_id, detail } => {
                (StatusCode::BAD_GATEWAY, detail, Some(node_id))
            }
            ApiError::Upstream {
                node_id,
                status,
                content_type,
                body,
            } => {
                // Pass the node's answer through untouched
                if let Ok(status) = StatusCode::from_u16(status) {
                    let content_type =
                        content_type.unwrap_or_else(|| "application/octet-stream".to_string());
                    return (status, [(header::CONTENT_TYPE, content_type)], body).into_response();
                }
                (
                    StatusCode::BAD_GATEWAY,
                    format!("node answered with invalid status {}", status),
                    Some(node_id),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: category,
            detail,
            node_id,
        };
        (status, Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => ApiError::NotFound(format!("Node {} not found", id)),
            RegistryError::Validation(msg) => ApiError::Validation(msg),
            RegistryError::Database(err) => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<JobQueueError> for ApiError {
    fn from(err: JobQueueError) -> Self {
        match err {
            JobQueueError::NotFound(id) => ApiError::NotFound(format!("Job {} not found", id)),
            JobQueueError::Database(err) => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(id) => ApiError::NotFound(format!("App {} not found", id)),
            AppError::Validation(msg) => ApiError::Validation(msg),
            AppError::Database(err) => ApiError::Internal(format!("Database error: {}", err)),
            AppError::Job(err) => err.into(),
        }
    }
}

impl From<RouteError> for ApiError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::MissingNodeId(err) => err.into(),
            RouteError::NodeNotFound(id) => ApiError::NotFound(format!("Node {} not found", id)),
            RouteError::Unreachable { node_id, reason } => ApiError::UpstreamUnreachable {
                detail: format!("Node {} is unreachable: {}", node_id, reason),
                node_id,
            },
            RouteError::Upstream {
                node_id,
                status,
                content_type,
                body,
            } => ApiError::Upstream {
                node_id,
                status,
                content_type,
                body,
            },
            RouteError::InvalidResponse { node_id, reason } => ApiError::UpstreamUnreachable {
                detail: format!("Node {} sent an unreadable response: {}", node_id, reason),
                node_id,
            },
            RouteError::Registry(err) => err.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Registry(err) => err.into(),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<MissingNodeId> for ApiError {
    fn from(err: MissingNodeId) -> Self {
        ApiError::Validation(err.to_string())
    }
}

// =============================================================================
// Extractor Rejections
// =============================================================================

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        let detail = match rejection {
            JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON",
            JsonRejection::JsonDataError(_) => "request body does not match the expected fields",
            JsonRejection::MissingJsonContentType(_) => {
                "request body must be sent as application/json"
            }
            _ => "request body could not be read",
        };
        ApiError::Validation(detail.to_string())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("Rejected path parameters: {}", rejection.body_text());
        ApiError::Validation("invalid path parameter".to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!("Rejected query string: {}", rejection.body_text());
        ApiError::Validation("invalid query string".to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
