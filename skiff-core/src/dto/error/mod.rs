//! Error body returned by every failing API call

use serde::{Deserialize, Serialize};

/// `{"error": "<category>", "detail": "<text>"}`
///
/// Upstream categories also carry the id of the node that failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short machine category (e.g. "not_found", "upstream_unreachable")
    pub error: String,

    /// Human readable detail, never contains internal error text
    pub detail: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}
