//! HTTP header names understood by every node.

/// Shared key presented by a front-of-cluster gateway
pub const GATEWAY_API_KEY: &str = "x-gateway-api-key";

/// Identity of the calling node (peer authentication)
pub const NODE_ID: &str = "x-node-id";

/// Secret of the calling node (peer authentication)
pub const NODE_API_KEY: &str = "x-node-api-key";

/// Shared token accepted by the registration endpoint
pub const REGISTRATION_TOKEN: &str = "x-registration-token";
