//! Client configuration

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Cluster nodes, selected in round-robin order
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// Preferred node tried before the rotation
    #[serde(default)]
    pub nearest_node: Option<NodeConfig>,

    /// API key sent as a bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-attempt connect/read deadline in milliseconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_ms: u64,

    /// How long a failed node stays out of rotation, in milliseconds
    #[serde(default = "default_healthcheck_interval")]
    pub healthcheck_interval_ms: u64,

    /// Attempt budget per request. Defaults to the number of configured nodes
    #[serde(default)]
    pub num_retries: Option<usize>,

    /// Delay between attempts in milliseconds
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    /// Headers added to every request
    #[serde(default)]
    pub additional_headers: BTreeMap<String, String>,
}

fn default_connection_timeout() -> u64 {
    5000
}

fn default_healthcheck_interval() -> u64 {
    60_000
}

fn default_retry_interval() -> u64 {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            nearest_node: None,
            api_key: None,
            connection_timeout_ms: default_connection_timeout(),
            healthcheck_interval_ms: default_healthcheck_interval(),
            num_retries: None,
            retry_interval_ms: default_retry_interval(),
            additional_headers: BTreeMap::new(),
        }
    }
}

/// URL scheme of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Http
    }
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// Address of a single node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub protocol: Protocol,

    /// Path prefix prepended to every request path, e.g. `/api`
    #[serde(default)]
    pub path: String,
}

fn default_port() -> u16 {
    3080
}

impl NodeConfig {
    pub fn new(host: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
            path: String::new(),
        }
    }

    /// Parse a node from a URL such as `https://search-1.internal:3080/api`
    pub fn from_url(raw: &str) -> Result<Self> {
        let url = url::Url::parse(raw)
            .map_err(|e| ClientError::Config(format!("Invalid node URL '{}': {}", raw, e)))?;

        let protocol = match url.scheme() {
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            other => {
                return Err(ClientError::Config(format!(
                    "Unsupported scheme '{}' in node URL '{}'",
                    other, raw
                )))
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| ClientError::Config(format!("Node URL '{}' has no host", raw)))?
            .to_string();

        let port = url.port_or_known_default().unwrap_or_else(default_port);
        let path = url.path().trim_end_matches('/').to_string();

        Ok(Self {
            host,
            port,
            protocol,
            path,
        })
    }
}

impl ClientConfig {
    /// Create a configuration for the given nodes with default timings
    pub fn with_nodes(nodes: Vec<NodeConfig>) -> Self {
        Self {
            nodes,
            ..Default::default()
        }
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: ClientConfig = serde_yaml::from_str(&raw).map_err(|e| {
            ClientError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before a client is built from it
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(ClientError::Config(
                "At least one node must be configured".to_string(),
            ));
        }

        for node in self.nodes.iter().chain(self.nearest_node.iter()) {
            if node.host.trim().is_empty() {
                return Err(ClientError::Config("Node host must not be empty".to_string()));
            }
        }

        if self.connection_timeout_ms == 0 {
            return Err(ClientError::Config(
                "connection_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.num_retries == Some(0) {
            return Err(ClientError::Config(
                "num_retries must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Effective attempt budget per request
    pub fn attempt_budget(&self) -> usize {
        self.num_retries.unwrap_or_else(|| {
            self.nodes.len() + usize::from(self.nearest_node.is_some())
        })
    }

    /// Get connection timeout as Duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Get health cooldown as Duration
    pub fn healthcheck_interval(&self) -> Duration {
        Duration::from_millis(self.healthcheck_interval_ms)
    }

    /// Get retry delay as Duration
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}
