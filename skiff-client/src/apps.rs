//! App endpoints
//!
//! Every app lives on one node; `node_id` tells the receiving node where to
//! route the call. Lists may span several nodes.

use crate::NodeClient;
use crate::error::Result;
use reqwest::Method;
use skiff_core::domain::app::App;
use skiff_core::domain::job::Job;
use skiff_core::dto::app::{AppAction, CreateApp, FanOutList};

impl NodeClient {
    /// List apps across nodes
    ///
    /// # Arguments
    /// * `node_ids` - Nodes to ask; `None` asks every registered node
    pub async fn list_apps(&self, node_ids: Option<&[String]>) -> Result<FanOutList<App>> {
        let mut builder = self.request(Method::GET, "/apps");
        if let Some(ids) = node_ids {
            builder = builder.query(&[("node_ids", ids.join(","))]);
        }
        let response = builder.send().await?;

        self.handle_response(response).await
    }

    /// Get an app from the node that owns it
    pub async fn get_app(&self, app_id: &str, node_id: &str) -> Result<App> {
        let path = format!("/apps/{}", app_id);
        let response = self
            .request(Method::GET, &path)
            .query(&[("node_id", node_id)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create an app on `node_id`
    pub async fn create_app(&self, node_id: &str, req: &CreateApp) -> Result<App> {
        let response = self
            .request(Method::POST, "/apps")
            .query(&[("node_id", node_id)])
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Delete an app record from the node that owns it
    pub async fn delete_app(&self, app_id: &str, node_id: &str) -> Result<()> {
        let path = format!("/apps/{}", app_id);
        let response = self
            .request(Method::DELETE, &path)
            .query(&[("node_id", node_id)])
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Trigger a long-running action; returns the queued job to poll
    pub async fn trigger_app_action(
        &self,
        app_id: &str,
        node_id: &str,
        action: AppAction,
    ) -> Result<Job> {
        let path = format!("/apps/{}/{}", app_id, action);
        let response = self
            .request(Method::POST, &path)
            .query(&[("node_id", node_id)])
            .send()
            .await?;

        self.handle_response(response).await
    }
}
