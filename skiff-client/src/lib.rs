//! Skiff HTTP Client
//!
//! A type-safe HTTP client for a Skiff node's API.
//!
//! The same client is used by the CLI (user credentials), by secondaries
//! talking to the primary (registration token, node credentials) and by the
//! node router forwarding calls between nodes.
//!
//! # Example
//!
//! ```no_run
//! use skiff_client::{Credentials, NodeClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = NodeClient::new("http://localhost:7300")
//!         .with_credentials(Credentials::user("admin-token"));
//!
//!     for node in client.list_nodes().await? {
//!         println!("{} {}", node.name, node.status);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod apps;
mod jobs;
mod nodes;

pub use error::{ClientError, Result};

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use skiff_core::headers;
use std::fmt;

/// Credentials attached to every request a [`NodeClient`] sends
#[derive(Clone, Default)]
pub enum Credentials {
    #[default]
    Anonymous,
    /// Bearer token of an interactive user
    User { token: String },
    /// Peer credentials of a cluster node
    Node { node_id: String, api_key: String },
    /// Shared key of a front-of-cluster gateway
    Gateway { api_key: String },
    /// Shared token accepted by the registration endpoint
    Registration { token: String },
}

impl Credentials {
    pub fn user(token: impl Into<String>) -> Self {
        Self::User {
            token: token.into(),
        }
    }

    pub fn node(node_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::Node {
            node_id: node_id.into(),
            api_key: api_key.into(),
        }
    }

    pub fn gateway(api_key: impl Into<String>) -> Self {
        Self::Gateway {
            api_key: api_key.into(),
        }
    }

    pub fn registration(token: impl Into<String>) -> Self {
        Self::Registration {
            token: token.into(),
        }
    }

    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::Anonymous => builder,
            Credentials::User { token } => builder.bearer_auth(token),
            Credentials::Node { node_id, api_key } => builder
                .header(headers::NODE_ID, node_id)
                .header(headers::NODE_API_KEY, api_key),
            Credentials::Gateway { api_key } => builder.header(headers::GATEWAY_API_KEY, api_key),
            Credentials::Registration { token } => {
                builder.header(headers::REGISTRATION_TOKEN, token)
            }
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => write!(f, "Anonymous"),
            Credentials::User { .. } => write!(f, "User(..)"),
            Credentials::Node { node_id, .. } => write!(f, "Node({})", node_id),
            Credentials::Gateway { .. } => write!(f, "Gateway(..)"),
            Credentials::Registration { .. } => write!(f, "Registration(..)"),
        }
    }
}

/// Response returned untouched by [`NodeClient::request_raw`]
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for one node's API
#[derive(Debug, Clone)]
pub struct NodeClient {
    /// Base URL of the node (e.g., "http://localhost:7300")
    base_url: String,
    /// HTTP client instance
    client: Client,
    credentials: Credentials,
}

impl NodeClient {
    /// Create a new client without credentials
    ///
    /// # Example
    /// ```
    /// use skiff_client::NodeClient;
    ///
    /// let client = NodeClient::new("http://localhost:7300");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    /// Every node-to-node client is built this way so calls to a hung peer
    /// are bounded.
    ///
    /// # Example
    /// ```
    /// use skiff_client::NodeClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(5))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = NodeClient::with_client("http://localhost:7300", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credentials: Credentials::Anonymous,
        }
    }

    /// Attach credentials to every subsequent request
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Get the base URL of the node
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.credentials.apply(self.client.request(method, url))
    }

    /// Send a request and hand back status and body without interpreting them
    ///
    /// `path` includes the query string. Only transport failures are errors;
    /// any HTTP status is returned as-is.
    pub async fn request_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<RawResponse> {
        tracing::debug!("{} {}{} as {:?}", method, self.base_url, path, self.credentials);

        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    ///
    /// This method checks the status code and returns an error if the request failed.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
