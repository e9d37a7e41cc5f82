//! Node membership and liveness endpoints

use crate::NodeClient;
use crate::error::Result;
use reqwest::Method;
use skiff_core::dto::node::{
    CreateNode, NodeHealth, NodeStatusReport, NodeSummary, RegisterNode, UpdateNode,
};

impl NodeClient {
    // =============================================================================
    // Peer Endpoints
    // =============================================================================

    /// Register a node with the primary
    ///
    /// Idempotent: re-registering the same id updates the entry in place.
    pub async fn register_node(&self, req: &RegisterNode) -> Result<NodeSummary> {
        let response = self
            .request(Method::POST, "/internal/nodes/register")
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Send a heartbeat for `node_id` to the primary
    pub async fn send_heartbeat(&self, node_id: &str) -> Result<()> {
        let path = format!("/internal/nodes/{}/heartbeat", node_id);
        let response = self.request(Method::POST, &path).send().await?;

        self.handle_empty_response(response).await
    }

    /// Reachability probe; succeeds on any 2xx
    pub async fn health(&self) -> Result<()> {
        let response = self.request(Method::GET, "/health").send().await?;

        self.handle_empty_response(response).await
    }

    /// What the receiving node reports about itself
    pub async fn status(&self) -> Result<NodeStatusReport> {
        let response = self.request(Method::GET, "/status").send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Membership Management
    // =============================================================================

    /// List all registered nodes
    pub async fn list_nodes(&self) -> Result<Vec<NodeSummary>> {
        let response = self.request(Method::GET, "/nodes").send().await?;

        self.handle_response(response).await
    }

    /// Get a single node
    pub async fn get_node(&self, node_id: &str) -> Result<NodeSummary> {
        let path = format!("/nodes/{}", node_id);
        let response = self.request(Method::GET, &path).send().await?;

        self.handle_response(response).await
    }

    /// Add a node manually
    pub async fn create_node(&self, req: &CreateNode) -> Result<NodeSummary> {
        let response = self
            .request(Method::POST, "/nodes")
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Partially update a node
    pub async fn update_node(&self, node_id: &str, req: &UpdateNode) -> Result<NodeSummary> {
        let path = format!("/nodes/{}", node_id);
        let response = self.request(Method::PUT, &path).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Remove a node from the registry
    pub async fn delete_node(&self, node_id: &str) -> Result<()> {
        let path = format!("/nodes/{}", node_id);
        let response = self.request(Method::DELETE, &path).send().await?;

        self.handle_empty_response(response).await
    }

    /// Probe a node now and return the recorded outcome
    pub async fn check_node_health(&self, node_id: &str) -> Result<NodeHealth> {
        let path = format!("/nodes/{}/health", node_id);
        let response = self.request(Method::GET, &path).send().await?;

        self.handle_response(response).await
    }
}
