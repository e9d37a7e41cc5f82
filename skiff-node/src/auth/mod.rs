//! Tiered authentication
//!
//! Three mutually exclusive credential checks, evaluated in order:
//!
//! 1. Gateway: `X-Gateway-API-Key`, scope `Local(<this node>)`
//! 2. Node: `X-Node-ID` + `X-Node-API-Key`, scope `Local(<calling node>)`
//! 3. User: `Authorization: Bearer <token>`, scope `Explicit`
//!
//! Presenting gateway or node credentials that do not check out is a hard
//! failure; only the complete absence of those headers falls through to the
//! user tier.

pub mod middleware;
pub mod scope;

pub use scope::{MissingNodeId, RequestScope, Target};

use axum::http::{HeaderMap, header::AUTHORIZATION};
use skiff_core::headers;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::Config;
use crate::service::{NodeRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid gateway API key")]
    InvalidGatewayKey,

    #[error("both X-Node-ID and X-Node-API-Key are required")]
    IncompleteNodeCredentials,

    #[error("invalid node credentials")]
    InvalidNodeCredentials,

    #[error("invalid registration token")]
    InvalidRegistrationToken,

    #[error("registration requires a registration token or node credentials")]
    MissingRegistrationCredentials,

    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid bearer token")]
    InvalidToken,

    #[error("node lookup failed: {0}")]
    Registry(#[from] RegistryError),
}

pub struct Authenticator {
    node_id: String,
    is_primary: bool,
    api_key: String,
    gateway_api_key: Option<String>,
    registration_token: Option<String>,
    user_token: Option<String>,
    registry: NodeRegistry,
}

impl Authenticator {
    pub fn new(config: &Config, registry: NodeRegistry) -> Self {
        Self {
            node_id: config.node_id.clone(),
            is_primary: config.is_primary(),
            api_key: config.api_key.clone(),
            gateway_api_key: config.gateway_api_key.clone(),
            registration_token: config.registration_token.clone(),
            user_token: config.user_token.clone(),
            registry,
        }
    }

    /// Classify a request and derive its scope
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<RequestScope, AuthError> {
        if let Some(result) = self.check_gateway(headers) {
            return result;
        }
        if let Some(result) = self.check_node(headers).await {
            return result;
        }
        self.check_user(headers)
    }

    /// Registration accepts the shared registration token or valid node
    /// credentials, nothing else
    pub async fn authenticate_registration(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        if let Some(presented) = header(headers, headers::REGISTRATION_TOKEN) {
            return match &self.registration_token {
                Some(expected) if secure_eq(presented, expected) => Ok(()),
                _ => Err(AuthError::InvalidRegistrationToken),
            };
        }

        match self.check_node(headers).await {
            Some(result) => result.map(|_| ()),
            None => Err(AuthError::MissingRegistrationCredentials),
        }
    }

    fn check_gateway(&self, headers: &HeaderMap) -> Option<Result<RequestScope, AuthError>> {
        let presented = header(headers, headers::GATEWAY_API_KEY)?;

        Some(match &self.gateway_api_key {
            Some(expected) if secure_eq(presented, expected) => {
                Ok(RequestScope::Local(self.node_id.clone()))
            }
            _ => Err(AuthError::InvalidGatewayKey),
        })
    }

    async fn check_node(&self, headers: &HeaderMap) -> Option<Result<RequestScope, AuthError>> {
        let node_id = header(headers, headers::NODE_ID);
        let api_key = header(headers, headers::NODE_API_KEY);

        let (node_id, api_key) = match (node_id, api_key) {
            (None, None) => return None,
            (Some(node_id), Some(api_key)) if !node_id.is_empty() => (node_id, api_key),
            _ => return Some(Err(AuthError::IncompleteNodeCredentials)),
        };

        Some(self.verify_node(node_id, api_key).await)
    }

    async fn verify_node(&self, node_id: &str, api_key: &str) -> Result<RequestScope, AuthError> {
        // Only the primary calls a secondary's peer API, with the key
        // configured on the secondary itself.
        let valid = if self.is_primary {
            match self.registry.find(node_id).await? {
                Some(node) => secure_eq(api_key, &node.api_key),
                None => false,
            }
        } else {
            secure_eq(api_key, &self.api_key)
        };

        if valid {
            Ok(RequestScope::Local(node_id.to_string()))
        } else {
            tracing::warn!("Rejected node credentials for {}", node_id);
            Err(AuthError::InvalidNodeCredentials)
        }
    }

    fn check_user(&self, headers: &HeaderMap) -> Result<RequestScope, AuthError> {
        let Some(expected) = &self.user_token else {
            return Ok(RequestScope::Explicit);
        };

        let token = header(headers, AUTHORIZATION.as_str())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AuthError::MissingToken)?;

        if secure_eq(token.trim(), expected) {
            Ok(RequestScope::Explicit)
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

/// A header that is present but not valid UTF-8 reads as empty, so it can
/// never match a configured secret.
fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .map(|value| value.to_str().unwrap_or_default())
}

fn secure_eq(presented: &str, expected: &str) -> bool {
    !presented.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Role;
    use crate::db::test_pool;
    use axum::http::HeaderValue;
    use skiff_core::domain::node::Node;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    async fn primary() -> Authenticator {
        let registry = NodeRegistry::new(test_pool().await);
        registry
            .create(Node::new("worker-1", "worker-1", "http://w1:7300", "w1-key", false))
            .await
            .unwrap();

        let mut config = Config::new("primary".to_string(), Role::Primary);
        config.gateway_api_key = Some("gw-key".to_string());
        config.registration_token = Some("join-me".to_string());
        config.user_token = Some("user-token".to_string());
        Authenticator::new(&config, registry)
    }

    async fn secondary() -> Authenticator {
        let mut config = Config::new("worker-1".to_string(), Role::Secondary);
        config.api_key = "w1-key".to_string();
        Authenticator::new(&config, NodeRegistry::new(test_pool().await))
    }

    #[tokio::test]
    async fn test_gateway_key_scopes_to_receiving_node_regardless_of_other_headers() {
        let auth = primary().await;
        let scope = auth
            .authenticate(&headers(&[
                (headers::GATEWAY_API_KEY, "gw-key"),
                (headers::NODE_ID, "worker-1"),
                (headers::NODE_API_KEY, "wrong"),
                ("authorization", "Bearer nope"),
            ]))
            .await
            .unwrap();
        assert_eq!(scope, RequestScope::Local("primary".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_gateway_key_does_not_fall_through() {
        let auth = primary().await;
        let err = auth
            .authenticate(&headers(&[
                (headers::GATEWAY_API_KEY, "guess"),
                ("authorization", "Bearer user-token"),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidGatewayKey));
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_rejects_any_key() {
        let auth = secondary().await;
        let err = auth
            .authenticate(&headers(&[(headers::GATEWAY_API_KEY, "anything")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidGatewayKey));
    }

    #[tokio::test]
    async fn test_primary_checks_node_key_against_registry() {
        let auth = primary().await;
        let scope = auth
            .authenticate(&headers(&[
                (headers::NODE_ID, "worker-1"),
                (headers::NODE_API_KEY, "w1-key"),
            ]))
            .await
            .unwrap();
        assert_eq!(scope, RequestScope::Local("worker-1".to_string()));

        let err = auth
            .authenticate(&headers(&[
                (headers::NODE_ID, "worker-2"),
                (headers::NODE_API_KEY, "w1-key"),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidNodeCredentials));
    }

    #[tokio::test]
    async fn test_invalid_node_key_does_not_fall_through_to_user() {
        let auth = primary().await;
        let err = auth
            .authenticate(&headers(&[
                (headers::NODE_ID, "worker-1"),
                (headers::NODE_API_KEY, "bad"),
                ("authorization", "Bearer user-token"),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidNodeCredentials));
    }

    #[tokio::test]
    async fn test_partial_node_credentials_are_rejected() {
        let auth = primary().await;
        let err = auth
            .authenticate(&headers(&[(headers::NODE_ID, "worker-1")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::IncompleteNodeCredentials));
    }

    #[tokio::test]
    async fn test_secondary_checks_its_own_key() {
        let auth = secondary().await;
        let scope = auth
            .authenticate(&headers(&[
                (headers::NODE_ID, "worker-1"),
                (headers::NODE_API_KEY, "w1-key"),
            ]))
            .await
            .unwrap();
        assert!(scope.is_local());

        let err = auth
            .authenticate(&headers(&[
                (headers::NODE_ID, "worker-1"),
                (headers::NODE_API_KEY, "other"),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidNodeCredentials));
    }

    #[tokio::test]
    async fn test_user_tier() {
        let auth = primary().await;
        let scope = auth
            .authenticate(&headers(&[("authorization", "Bearer user-token")]))
            .await
            .unwrap();
        assert_eq!(scope, RequestScope::Explicit);

        assert!(matches!(
            auth.authenticate(&HeaderMap::new()).await.unwrap_err(),
            AuthError::MissingToken
        ));
        assert!(matches!(
            auth.authenticate(&headers(&[("authorization", "Bearer nope")]))
                .await
                .unwrap_err(),
            AuthError::InvalidToken
        ));

        // no user token configured: user access is open
        let open = secondary().await;
        assert_eq!(
            open.authenticate(&HeaderMap::new()).await.unwrap(),
            RequestScope::Explicit
        );
    }

    #[tokio::test]
    async fn test_registration_credentials() {
        let auth = primary().await;
        assert!(
            auth.authenticate_registration(&headers(&[(headers::REGISTRATION_TOKEN, "join-me")]))
                .await
                .is_ok()
        );
        assert!(matches!(
            auth.authenticate_registration(&headers(&[(headers::REGISTRATION_TOKEN, "nope")]))
                .await
                .unwrap_err(),
            AuthError::InvalidRegistrationToken
        ));
        assert!(
            auth.authenticate_registration(&headers(&[
                (headers::NODE_ID, "worker-1"),
                (headers::NODE_API_KEY, "w1-key"),
            ]))
            .await
            .is_ok()
        );
        assert!(matches!(
            auth.authenticate_registration(&HeaderMap::new())
                .await
                .unwrap_err(),
            AuthError::MissingRegistrationCredentials
        ));
    }
}
