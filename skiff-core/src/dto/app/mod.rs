//! App DTOs
//!
//! Request bodies for app management plus the envelope used for lists
//! aggregated across several nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::job::JobKind;

/// Request to create an app on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApp {
    /// Optional caller-chosen id; generated when absent
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub compose_file: Option<String>,
}

/// Long-running operations a user may trigger on an app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppAction {
    Deploy,
    Stop,
    Restart,
    Rebuild,
}

impl From<AppAction> for JobKind {
    fn from(action: AppAction) -> Self {
        match action {
            AppAction::Deploy => JobKind::Deploy,
            AppAction::Stop => JobKind::Stop,
            AppAction::Restart => JobKind::Restart,
            AppAction::Rebuild => JobKind::Rebuild,
        }
    }
}

impl fmt::Display for AppAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(JobKind::from(*self).as_str())
    }
}

impl FromStr for AppAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deploy" => Ok(AppAction::Deploy),
            "stop" => Ok(AppAction::Stop),
            "restart" => Ok(AppAction::Restart),
            "rebuild" => Ok(AppAction::Rebuild),
            other => Err(format!("unknown app action '{}'", other)),
        }
    }
}

/// A list merged from several nodes
///
/// Nodes that failed to answer are left out of `items` and reported in
/// `errors`; `excluded_nodes` is their count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutList<T> {
    pub items: Vec<T>,
    pub excluded_nodes: usize,
    #[serde(default)]
    pub errors: Vec<NodeFailure>,
}

/// Why a node's contribution is missing from a [`FanOutList`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node_id: String,
    pub error: String,
}
