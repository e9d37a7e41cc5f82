//! Request scope
//!
//! Attached to every authenticated request and read once by the handler to
//! decide which node's data the call is about.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestScope {
    /// Peer or gateway traffic: act only on the receiving node's own data.
    /// Carries the node id the credentials speak for.
    Local(String),
    /// User traffic: resource routes must name their target node.
    Explicit,
}

/// Where a resource call should run, as far as the caller is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// On the receiving node, whatever `node_id` says
    Here,
    /// On the named node, which may or may not be the receiving one
    Node(&'a str),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("the node_id query parameter is required")]
pub struct MissingNodeId;

impl RequestScope {
    pub fn is_local(&self) -> bool {
        matches!(self, RequestScope::Local(_))
    }

    /// Resolve the target of a resource call
    ///
    /// Local scope ignores the requested node so peer calls are never
    /// forwarded a second time. Explicit scope requires it.
    pub fn target<'a>(&self, requested: Option<&'a str>) -> Result<Target<'a>, MissingNodeId> {
        match self {
            RequestScope::Local(_) => Ok(Target::Here),
            RequestScope::Explicit => match requested.map(str::trim) {
                Some(node_id) if !node_id.is_empty() => Ok(Target::Node(node_id)),
                _ => Err(MissingNodeId),
            },
        }
    }
}
