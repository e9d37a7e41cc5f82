//! App domain model
//!
//! An app is a compose project that lives on exactly one node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    pub name: String,
    /// Node that owns and runs this app
    pub node_id: String,
    pub status: AppStatus,
    /// Compose file path, relative to the node's apps directory
    pub compose_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    Created,
    Deploying,
    Running,
    Stopped,
    Error,
}

impl AppStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Created => "created",
            AppStatus::Deploying => "deploying",
            AppStatus::Running => "running",
            AppStatus::Stopped => "stopped",
            AppStatus::Error => "error",
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(AppStatus::Created),
            "deploying" => Ok(AppStatus::Deploying),
            "running" => Ok(AppStatus::Running),
            "stopped" => Ok(AppStatus::Stopped),
            "error" => Ok(AppStatus::Error),
            other => Err(format!("unknown app status '{}'", other)),
        }
    }
}
