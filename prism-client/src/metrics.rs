//! Client observability metrics
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the
//! embedding application installs a recorder.
//! - Attempt duration and outcome per node
//! - Retries and exhausted retry budgets
//! - Node health
//! - Import record outcomes

use crate::node::Node;
use std::time::{Duration, Instant};

/// Record duration of a single attempt against a node
pub fn record_attempt_duration(method: &str, node: &Node, duration: Duration) {
    metrics::histogram!(
        "prism_client_attempt_duration_seconds",
        "method" => method.to_string(),
        "node" => node.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record an attempt that received a response
pub fn record_attempt_response(method: &str, node: &Node, status: u16) {
    metrics::counter!(
        "prism_client_attempts_total",
        "method" => method.to_string(),
        "node" => node.to_string(),
        "outcome" => "response",
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Record an attempt that failed at the network level
pub fn record_attempt_failure(method: &str, node: &Node, reason: &str) {
    metrics::counter!(
        "prism_client_attempts_total",
        "method" => method.to_string(),
        "node" => node.to_string(),
        "outcome" => "network_error",
        "reason" => reason.to_string(),
    )
    .increment(1);
}

/// Record a retry against another node
pub fn record_retry(method: &str) {
    metrics::counter!(
        "prism_client_retries_total",
        "method" => method.to_string(),
    )
    .increment(1);
}

/// Record a request whose retry budget ran out
pub fn record_exhausted(method: &str) {
    metrics::counter!(
        "prism_client_exhausted_total",
        "method" => method.to_string(),
    )
    .increment(1);
}

/// Update node health gauge (1 = healthy, 0 = unhealthy)
pub fn update_node_health(node: &Node, healthy: bool) {
    metrics::gauge!(
        "prism_client_node_healthy",
        "node" => node.to_string(),
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

/// Record per-record import outcomes
pub fn record_import_results(succeeded: usize, failed: usize) {
    metrics::counter!("prism_client_import_records_total", "status" => "ok")
        .increment(succeeded as u64);
    metrics::counter!("prism_client_import_records_total", "status" => "error")
        .increment(failed as u64);
}

/// Guard for timing one attempt
pub struct AttemptTimer<'a> {
    method: &'a str,
    node: &'a Node,
    start: Instant,
}

impl<'a> AttemptTimer<'a> {
    /// Start timing an attempt
    pub fn new(method: &'a str, node: &'a Node) -> Self {
        Self {
            method,
            node,
            start: Instant::now(),
        }
    }

    /// Record a received response and duration
    pub fn response(self, status: u16) {
        record_attempt_duration(self.method, self.node, self.start.elapsed());
        record_attempt_response(self.method, self.node, status);
    }

    /// Record a network failure and duration
    pub fn failure(self, reason: &str) {
        record_attempt_duration(self.method, self.node, self.start.elapsed());
        record_attempt_failure(self.method, self.node, reason);
    }
}
