//! Round-robin node selection with health filtering
//!
//! The rotation cursor advances on every probe regardless of health, so load
//! spreads evenly over healthy nodes. Health filtering is layered on top:
//! nodes in their cooldown are skipped, and when every node is cooling down
//! the least-recently-failed one is returned so selection never fails.

use crate::error::{ClientError, Result};
use crate::health::HealthPolicy;
use crate::metrics;
use crate::node::{Node, NodeDirectory, NodeEntry, NodeHealth, NodeStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Stateful selector shared by all in-flight requests of a client
#[derive(Debug)]
pub struct NodeSelector {
    directory: NodeDirectory,
    policy: HealthPolicy,
    cursor: AtomicUsize,
}

impl NodeSelector {
    pub fn new(directory: NodeDirectory, policy: HealthPolicy) -> Result<Self> {
        if directory.is_empty() {
            return Err(ClientError::Config(
                "Node selector needs at least one node".to_string(),
            ));
        }
        Ok(Self {
            directory,
            policy,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn directory(&self) -> &NodeDirectory {
        &self.directory
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Pick the node for the next attempt
    pub fn next(&self) -> Arc<Node> {
        self.next_at(Instant::now())
    }

    pub(crate) fn next_at(&self, now: Instant) -> Arc<Node> {
        if let Some(entry) = self.directory.nearest_entry() {
            if self.policy.is_eligible(&entry.health(), now) {
                debug!(node = %entry.node(), "Selected nearest node");
                return Arc::clone(entry.node());
            }
        }

        let pool = self.directory.pool_entries();
        for _ in 0..pool.len() {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % pool.len();
            let entry = &pool[index];
            if self.policy.is_eligible(&entry.health(), now) {
                debug!(node = %entry.node(), index, "Selected node");
                return Arc::clone(entry.node());
            }
        }

        let fallback = least_recently_failed(pool);
        warn!(
            node = %fallback.node(),
            "All nodes are unhealthy, falling back to least recently failed node"
        );
        Arc::clone(fallback.node())
    }

    /// Mark a node unreachable; it leaves the rotation until its cooldown elapses
    pub(crate) fn report_failure(&self, node: &Node) {
        self.report_failure_at(node, Instant::now());
    }

    pub(crate) fn report_failure_at(&self, node: &Node, now: Instant) {
        if let Some(entry) = self.entry_for(node) {
            let previous = entry.replace_health(NodeHealth::failed_at(now));
            if previous.healthy {
                warn!(
                    node = %node,
                    cooldown_ms = self.policy.cooldown().as_millis() as u64,
                    "Marking node unhealthy"
                );
            }
            metrics::update_node_health(node, false);
        }
    }

    /// Mark a node reachable again
    pub(crate) fn report_success(&self, node: &Node) {
        if let Some(entry) = self.entry_for(node) {
            let previous = entry.replace_health(NodeHealth::default());
            if !previous.healthy {
                info!(node = %node, "Node is healthy again");
                metrics::update_node_health(node, true);
            }
        }
    }

    /// Entry for a node of this directory; nodes from another directory match nothing
    fn entry_for(&self, node: &Node) -> Option<&NodeEntry> {
        self.directory
            .entry(node.slot())
            .filter(|entry| entry.node().base_url() == node.base_url())
    }

    /// Health of every node, nearest first
    pub fn status(&self) -> Vec<NodeStatus> {
        self.directory.status(Instant::now())
    }
}

fn least_recently_failed(pool: &[NodeEntry]) -> &NodeEntry {
    pool.iter()
        .min_by_key(|entry| entry.health().unhealthy_since)
        .unwrap_or(&pool[0])
}
