//! Node Router
//!
//! Every resource lives on exactly one node. The router decides whether a
//! call runs here or is forwarded, in a single hop, to the owning node, and
//! fans list queries out across several nodes.

pub mod fanout;

pub use fanout::NodeSelection;

use reqwest::{Client, Method};
use skiff_client::{ClientError, Credentials, NodeClient, RawResponse};
use skiff_core::domain::node::Node;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{MissingNodeId, RequestScope, Target};
use crate::service::{NodeRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    MissingNodeId(#[from] MissingNodeId),

    #[error("node {0} not found")]
    NodeNotFound(String),

    #[error("node {node_id} is unreachable: {reason}")]
    Unreachable { node_id: String, reason: String },

    #[error("node {node_id} answered with status {status}")]
    Upstream {
        node_id: String,
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    },

    #[error("node {node_id} sent an unreadable response: {reason}")]
    InvalidResponse { node_id: String, reason: String },

    #[error("node lookup failed: {0}")]
    Registry(RegistryError),
}

impl From<RegistryError> for RouteError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => RouteError::NodeNotFound(id),
            other => RouteError::Registry(other),
        }
    }
}

/// Where a call executes
#[derive(Debug, Clone)]
pub enum Route {
    Local,
    Remote(Node),
}

#[derive(Clone)]
pub struct NodeRouter {
    node_id: String,
    registry: NodeRegistry,
    http: Client,
}

impl NodeRouter {
    /// Every forwarded call is bounded by `forward_timeout`
    pub fn new(
        node_id: impl Into<String>,
        registry: NodeRegistry,
        forward_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(forward_timeout).build()?;
        Ok(Self {
            node_id: node_id.into(),
            registry,
            http,
        })
    }

    /// Route a call for `node_id`
    ///
    /// Nodes that are disabled or were last seen unreachable are refused
    /// without attempting a hop.
    pub async fn resolve(&self, node_id: &str) -> Result<Route, RouteError> {
        if node_id == self.node_id {
            return Ok(Route::Local);
        }

        let node = self.registry.get(node_id).await?;
        if !node.is_routable() {
            return Err(RouteError::Unreachable {
                node_id: node.id,
                reason: format!("node is {}", node.status),
            });
        }

        Ok(Route::Remote(node))
    }

    /// Route a resource call made under `scope`
    pub async fn route(
        &self,
        scope: &RequestScope,
        requested: Option<&str>,
    ) -> Result<Route, RouteError> {
        match scope.target(requested)? {
            Target::Here => Ok(Route::Local),
            Target::Node(node_id) => self.resolve(node_id).await,
        }
    }

    /// Forward a call to `node` with peer credentials and return its answer
    ///
    /// `path` is the same public path the caller used. Transport failures
    /// become [`RouteError::Unreachable`], non-2xx answers
    /// [`RouteError::Upstream`] carrying the original status and body.
    pub async fn forward(
        &self,
        node: &Node,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<RawResponse, RouteError> {
        tracing::debug!("Forwarding {} {} to node {}", method, path, node.id);

        let client = NodeClient::with_client(&node.api_endpoint, self.http.clone())
            .with_credentials(Credentials::node(&node.id, &node.api_key));

        let response = client
            .request_raw(method, path, body)
            .await
            .map_err(|e| unreachable(&node.id, e))?;

        if !response.is_success() {
            return Err(RouteError::Upstream {
                node_id: node.id.clone(),
                status: response.status,
                content_type: response.content_type,
                body: response.body,
            });
        }

        Ok(response)
    }
}

fn unreachable(node_id: &str, err: ClientError) -> RouteError {
    tracing::warn!("Node {} unreachable: {}", node_id, err);
    RouteError::Unreachable {
        node_id: node_id.to_string(),
        reason: err.to_string(),
    }
}
