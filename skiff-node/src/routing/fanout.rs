//! Fan-out queries
//!
//! Issue the same list query to several nodes at once and merge what comes
//! back. A node that fails is left out and reported; it never fails the
//! whole query.

use futures_util::future::join_all;
use reqwest::Method;
use serde::de::DeserializeOwned;
use skiff_core::dto::app::{FanOutList, NodeFailure};
use std::future::Future;

use super::{NodeRouter, Route, RouteError};

/// Which nodes a fan-out query asks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSelection {
    /// Every registered node
    All,
    /// The listed nodes, in this order
    Nodes(Vec<String>),
}

impl NodeSelection {
    /// Parse the `node_ids` query parameter: absent or `all` selects every
    /// node, otherwise a comma separated list (duplicates dropped)
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return NodeSelection::All;
        }

        let mut ids: Vec<String> = Vec::new();
        for id in raw.split(',').map(str::trim).filter(|id| !id.is_empty()) {
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
        NodeSelection::Nodes(ids)
    }
}

impl NodeRouter {
    /// Run a list query on every selected node concurrently
    ///
    /// The receiving node answers through `local`; other nodes receive a
    /// `GET path` with peer credentials and answer about themselves. Items
    /// keep the order of the node list.
    pub async fn fan_out<T, F, Fut>(
        &self,
        selection: &NodeSelection,
        path: &str,
        local: F,
    ) -> Result<FanOutList<T>, RouteError>
    where
        T: DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Vec<T>, String>>,
    {
        let node_ids = match selection {
            NodeSelection::All => self
                .registry
                .list()
                .await?
                .into_iter()
                .map(|node| node.id)
                .collect(),
            NodeSelection::Nodes(ids) => ids.clone(),
        };

        let local = &local;
        let results = join_all(node_ids.iter().map(|node_id| async move {
            let outcome = match self.resolve(node_id).await {
                Ok(Route::Local) => local().await,
                Ok(Route::Remote(node)) => self
                    .fetch_list::<T>(&node, path)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            (node_id, outcome)
        }))
        .await;

        let mut merged = FanOutList {
            items: Vec::new(),
            excluded_nodes: 0,
            errors: Vec::new(),
        };
        for (node_id, outcome) in results {
            match outcome {
                Ok(items) => merged.items.extend(items),
                Err(error) => {
                    tracing::warn!("Excluding node {} from {}: {}", node_id, path, error);
                    merged.excluded_nodes += 1;
                    merged.errors.push(NodeFailure {
                        node_id: node_id.clone(),
                        error,
                    });
                }
            }
        }

        Ok(merged)
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        node: &skiff_core::domain::node::Node,
        path: &str,
    ) -> Result<Vec<T>, RouteError> {
        let response = self.forward(node, Method::GET, path, None).await?;
        let list: FanOutList<T> =
            serde_json::from_slice(&response.body).map_err(|e| RouteError::InvalidResponse {
                node_id: node.id.clone(),
                reason: e.to_string(),
            })?;
        Ok(list.items)
    }
}
