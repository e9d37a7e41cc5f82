//! Node configuration
//!
//! Defines all configurable parameters for a node: identity, role, peer
//! credentials, liveness intervals and job execution limits.

use std::path::PathBuf;
use std::time::Duration;

/// Whether this node is the cluster's primary or one of its secondaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Primary,
    Secondary,
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(Role::Primary),
            "secondary" => Ok(Role::Secondary),
            other => anyhow::bail!("SKIFF_ROLE must be 'primary' or 'secondary', got '{}'", other),
        }
    }
}

/// Node configuration
///
/// All timeouts and intervals are configurable to allow tuning
/// for different deployment scenarios (dev vs prod, fast vs slow networks).
#[derive(Debug, Clone)]
pub struct Config {
    /// Stable identifier of this node
    pub node_id: String,

    /// Unique human-facing name of this node
    pub node_name: String,

    pub role: Role,

    /// Address the HTTP API binds to
    pub bind_addr: String,

    /// Base URL other nodes use to reach this node
    pub api_endpoint: String,

    /// Secret the primary presents when calling this node
    pub api_key: String,

    /// Primary's base URL (secondaries only)
    pub primary_url: Option<String>,

    /// Shared token for the registration handshake; auto-registration is
    /// attempted only when set
    pub registration_token: Option<String>,

    /// Key accepted from a front-of-cluster gateway
    pub gateway_api_key: Option<String>,

    /// Bearer token accepted from users; user auth is open when unset
    pub user_token: Option<String>,

    pub database_url: String,

    /// Root directory of the compose projects run by this node
    pub apps_dir: PathBuf,

    /// How often the primary probes every registered node
    pub health_check_interval: Duration,

    /// Steady-state heartbeat interval (secondaries)
    pub heartbeat_interval: Duration,

    /// First backoff step after a failed heartbeat
    pub heartbeat_backoff_initial: Duration,

    /// Upper bound for heartbeat backoff
    pub heartbeat_backoff_max: Duration,

    /// Auto-registration attempts before giving up
    pub registration_attempts: u32,

    /// Delay after the first failed registration attempt, doubled each time
    pub registration_backoff: Duration,

    /// How often the job worker looks for pending jobs
    pub job_poll_interval: Duration,

    /// Maximum time a job can run before it is failed
    pub job_timeout: Duration,

    /// Timeout for calls forwarded to another node
    pub forward_timeout: Duration,

    /// Timeout for a single health probe or heartbeat
    pub probe_timeout: Duration,

    /// Default number of jobs returned by job history queries
    pub job_history_limit: u32,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(node_id: String, role: Role) -> Self {
        Self {
            node_name: node_id.clone(),
            node_id,
            role,
            bind_addr: "0.0.0.0:7300".to_string(),
            api_endpoint: "http://127.0.0.1:7300".to_string(),
            api_key: uuid::Uuid::new_v4().simple().to_string(),
            primary_url: None,
            registration_token: None,
            gateway_api_key: None,
            user_token: None,
            database_url: "sqlite://skiff.db".to_string(),
            apps_dir: PathBuf::from("./apps"),
            health_check_interval: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_backoff_initial: Duration::from_secs(5),
            heartbeat_backoff_max: Duration::from_secs(300),
            registration_attempts: 5,
            registration_backoff: Duration::from_secs(5),
            job_poll_interval: Duration::from_millis(1000),
            job_timeout: Duration::from_secs(1800), // 30 minutes
            forward_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            job_history_limit: 50,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - SKIFF_ROLE (optional, "primary" | "secondary", default: primary)
    /// - SKIFF_NODE_NAME (optional, default: $HOSTNAME or "skiff-node")
    /// - SKIFF_NODE_ID (optional, default: the node name)
    /// - SKIFF_BIND_ADDR, SKIFF_API_ENDPOINT, DATABASE_URL, SKIFF_APPS_DIR
    /// - SKIFF_API_KEY (required for secondaries, generated for a primary)
    /// - SKIFF_PRIMARY_URL (required for secondaries)
    /// - SKIFF_REGISTRATION_TOKEN, SKIFF_GATEWAY_API_KEY, SKIFF_USER_TOKEN
    /// - SKIFF_HEALTH_CHECK_INTERVAL, SKIFF_HEARTBEAT_INTERVAL,
    ///   SKIFF_HEARTBEAT_BACKOFF_INITIAL, SKIFF_HEARTBEAT_BACKOFF_MAX,
    ///   SKIFF_REGISTRATION_BACKOFF, SKIFF_JOB_TIMEOUT, SKIFF_FORWARD_TIMEOUT,
    ///   SKIFF_PROBE_TIMEOUT (seconds)
    /// - SKIFF_JOB_POLL_INTERVAL_MS (milliseconds)
    /// - SKIFF_REGISTRATION_ATTEMPTS, SKIFF_JOB_HISTORY_LIMIT
    pub fn from_env() -> anyhow::Result<Self> {
        let role = match env_string("SKIFF_ROLE") {
            Some(role) => role.parse()?,
            None => Role::Primary,
        };

        let node_name = env_string("SKIFF_NODE_NAME")
            .or_else(|| env_string("HOSTNAME"))
            .unwrap_or_else(|| "skiff-node".to_string());
        let node_id = env_string("SKIFF_NODE_ID").unwrap_or_else(|| node_name.clone());

        let mut config = Self::new(node_id, role);
        config.node_name = node_name;

        if let Some(bind_addr) = env_string("SKIFF_BIND_ADDR") {
            config.bind_addr = bind_addr;
        }
        if let Some(api_endpoint) = env_string("SKIFF_API_ENDPOINT") {
            config.api_endpoint = api_endpoint;
        }
        match env_string("SKIFF_API_KEY") {
            Some(api_key) => config.api_key = api_key,
            None if role == Role::Secondary => {
                anyhow::bail!("SKIFF_API_KEY environment variable not set")
            }
            None => {}
        }
        if let Some(database_url) = env_string("DATABASE_URL") {
            config.database_url = database_url;
        }
        if let Some(apps_dir) = env_string("SKIFF_APPS_DIR") {
            config.apps_dir = PathBuf::from(apps_dir);
        }

        config.primary_url = env_string("SKIFF_PRIMARY_URL");
        config.registration_token = env_string("SKIFF_REGISTRATION_TOKEN");
        config.gateway_api_key = env_string("SKIFF_GATEWAY_API_KEY");
        config.user_token = env_string("SKIFF_USER_TOKEN");

        config.health_check_interval =
            env_secs("SKIFF_HEALTH_CHECK_INTERVAL", config.health_check_interval);
        config.heartbeat_interval = env_secs("SKIFF_HEARTBEAT_INTERVAL", config.heartbeat_interval);
        config.heartbeat_backoff_initial = env_secs(
            "SKIFF_HEARTBEAT_BACKOFF_INITIAL",
            config.heartbeat_backoff_initial,
        );
        config.heartbeat_backoff_max =
            env_secs("SKIFF_HEARTBEAT_BACKOFF_MAX", config.heartbeat_backoff_max);
        config.registration_backoff =
            env_secs("SKIFF_REGISTRATION_BACKOFF", config.registration_backoff);
        config.job_timeout = env_secs("SKIFF_JOB_TIMEOUT", config.job_timeout);
        config.forward_timeout = env_secs("SKIFF_FORWARD_TIMEOUT", config.forward_timeout);
        config.probe_timeout = env_secs("SKIFF_PROBE_TIMEOUT", config.probe_timeout);

        config.job_poll_interval = std::env::var("SKIFF_JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(config.job_poll_interval);

        config.registration_attempts = std::env::var("SKIFF_REGISTRATION_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(config.registration_attempts);

        config.job_history_limit = std::env::var("SKIFF_JOB_HISTORY_LIMIT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(config.job_history_limit);

        Ok(config)
    }

    pub fn is_primary(&self) -> bool {
        self.role == Role::Primary
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node_id.trim().is_empty() {
            anyhow::bail!("node_id cannot be empty");
        }

        if self.node_name.trim().is_empty() {
            anyhow::bail!("node_name cannot be empty");
        }

        if self.api_key.is_empty() {
            anyhow::bail!("api_key cannot be empty");
        }

        if !is_http_url(&self.api_endpoint) {
            anyhow::bail!("api_endpoint must start with http:// or https://");
        }

        if self.role == Role::Secondary {
            match &self.primary_url {
                None => anyhow::bail!("primary_url is required for secondary nodes"),
                Some(url) if !is_http_url(url) => {
                    anyhow::bail!("primary_url must start with http:// or https://")
                }
                Some(_) => {}
            }
        }

        for (name, value) in [
            ("health_check_interval", self.health_check_interval),
            ("heartbeat_interval", self.heartbeat_interval),
            ("heartbeat_backoff_initial", self.heartbeat_backoff_initial),
            ("job_poll_interval", self.job_poll_interval),
            ("job_timeout", self.job_timeout),
            ("forward_timeout", self.forward_timeout),
            ("probe_timeout", self.probe_timeout),
        ] {
            if value.is_zero() {
                anyhow::bail!("{} must be greater than 0", name);
            }
        }

        if self.heartbeat_backoff_max < self.heartbeat_backoff_initial {
            anyhow::bail!("heartbeat_backoff_max must not be smaller than heartbeat_backoff_initial");
        }

        if self.registration_attempts == 0 {
            anyhow::bail!("registration_attempts must be greater than 0");
        }

        if self.job_history_limit == 0 {
            anyhow::bail!("job_history_limit must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), Role::Primary)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
