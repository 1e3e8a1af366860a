//! Cluster nodes and their health state
//!
//! The directory owns every configured node for the lifetime of a client.
//! Health is tracked per node behind its own lock, so updates for different
//! nodes never contend.

use crate::config::{ClientConfig, NodeConfig, Protocol};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Position of a node inside the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeSlot {
    Nearest,
    Pool(usize),
}

/// One addressable instance of the search service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    host: String,
    port: u16,
    protocol: Protocol,
    path: String,
    slot: NodeSlot,
    base_url: String,
}

impl Node {
    fn new(config: &NodeConfig, slot: NodeSlot) -> Self {
        let path = config.path.trim_end_matches('/').to_string();
        let base_url = format!(
            "{}://{}:{}{}",
            config.protocol.as_str(),
            config.host,
            config.port,
            path
        );
        Self {
            host: config.host.clone(),
            port: config.port,
            protocol: config.protocol,
            path,
            slot,
            base_url,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn slot(&self) -> NodeSlot {
        self.slot
    }

    pub fn is_nearest(&self) -> bool {
        self.slot == NodeSlot::Nearest
    }

    /// `protocol://host:port/prefix`, without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for a request path such as `/collections/books/documents`
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url)
    }
}

/// Reachability state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHealth {
    pub healthy: bool,
    /// When the node was last marked unhealthy
    pub unhealthy_since: Option<Instant>,
}

impl Default for NodeHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            unhealthy_since: None,
        }
    }
}

impl NodeHealth {
    pub fn failed_at(at: Instant) -> Self {
        Self {
            healthy: false,
            unhealthy_since: Some(at),
        }
    }
}

/// A node together with its mutable health
#[derive(Debug)]
pub(crate) struct NodeEntry {
    node: Arc<Node>,
    health: Mutex<NodeHealth>,
}

impl NodeEntry {
    fn new(node: Node) -> Self {
        Self {
            node: Arc::new(node),
            health: Mutex::new(NodeHealth::default()),
        }
    }

    pub(crate) fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub(crate) fn health(&self) -> NodeHealth {
        *self.health.lock()
    }

    /// Store `health` and return the previous state, under one lock
    pub(crate) fn replace_health(&self, health: NodeHealth) -> NodeHealth {
        std::mem::replace(&mut *self.health.lock(), health)
    }
}

/// Point-in-time view of one node, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub node: String,
    pub nearest: bool,
    pub healthy: bool,
    /// Time since the node was marked unhealthy
    pub unhealthy_for: Option<Duration>,
}

/// Ordered pool of configured nodes plus the optional nearest node
#[derive(Debug)]
pub struct NodeDirectory {
    pool: Vec<NodeEntry>,
    nearest: Option<NodeEntry>,
}

impl NodeDirectory {
    pub fn new(nodes: &[NodeConfig], nearest: Option<&NodeConfig>) -> Self {
        let pool = nodes
            .iter()
            .enumerate()
            .map(|(i, config)| NodeEntry::new(Node::new(config, NodeSlot::Pool(i))))
            .collect();
        let nearest = nearest.map(|config| NodeEntry::new(Node::new(config, NodeSlot::Nearest)));
        Self { pool, nearest }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.nodes, config.nearest_node.as_ref())
    }

    /// Number of nodes in the rotation (the nearest node is not counted)
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.pool.iter().map(NodeEntry::node)
    }

    pub fn nearest(&self) -> Option<&Arc<Node>> {
        self.nearest.as_ref().map(NodeEntry::node)
    }

    pub(crate) fn pool_entries(&self) -> &[NodeEntry] {
        &self.pool
    }

    pub(crate) fn nearest_entry(&self) -> Option<&NodeEntry> {
        self.nearest.as_ref()
    }

    pub(crate) fn entry(&self, slot: NodeSlot) -> Option<&NodeEntry> {
        match slot {
            NodeSlot::Nearest => self.nearest.as_ref(),
            NodeSlot::Pool(i) => self.pool.get(i),
        }
    }

    /// Current health of a node
    pub fn health(&self, node: &Node) -> Option<NodeHealth> {
        self.entry(node.slot()).map(NodeEntry::health)
    }

    /// Health of every node, nearest first
    pub fn status(&self, now: Instant) -> Vec<NodeStatus> {
        self.nearest
            .iter()
            .chain(self.pool.iter())
            .map(|entry| {
                let health = entry.health();
                NodeStatus {
                    node: entry.node().to_string(),
                    nearest: entry.node().is_nearest(),
                    healthy: health.healthy,
                    unhealthy_for: health
                        .unhealthy_since
                        .map(|since| now.saturating_duration_since(since)),
                }
            })
            .collect()
    }
}
