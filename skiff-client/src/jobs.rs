//! Job status endpoints

use crate::NodeClient;
use crate::error::Result;
use reqwest::Method;
use skiff_core::domain::job::Job;
use uuid::Uuid;

impl NodeClient {
    /// Poll a job on the node that runs it
    pub async fn get_job(&self, job_id: Uuid, node_id: &str) -> Result<Job> {
        let path = format!("/jobs/{}", job_id);
        let response = self
            .request(Method::GET, &path)
            .query(&[("node_id", node_id)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Job history of an app, newest first
    ///
    /// # Arguments
    /// * `limit` - Maximum number of jobs; the node applies its default when `None`
    pub async fn list_app_jobs(
        &self,
        app_id: &str,
        node_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Job>> {
        let path = format!("/apps/{}/jobs", app_id);
        let mut builder = self
            .request(Method::GET, &path)
            .query(&[("node_id", node_id)]);
        if let Some(limit) = limit {
            builder = builder.query(&[("limit", limit)]);
        }
        let response = builder.send().await?;

        self.handle_response(response).await
    }
}
