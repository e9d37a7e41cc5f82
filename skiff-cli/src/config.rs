//! Configuration module
//!
//! Which node the CLI talks to and how it authenticates.

use skiff_client::{Credentials, NodeClient};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the node receiving every command (usually the primary)
    pub url: String,
    /// Bearer token for the user tier; sent only when set
    pub token: Option<String>,
}

impl Config {
    pub fn client(&self) -> NodeClient {
        let client = NodeClient::new(&self.url);
        match &self.token {
            Some(token) => client.with_credentials(Credentials::user(token)),
            None => client,
        }
    }
}
