//! Bounded retry across cluster nodes
//!
//! Each attempt goes to a freshly selected node. Only network failures are
//! retried; any HTTP response, including an error status, ends the loop
//! after that attempt.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::metrics;
use crate::request::{RawResponse, RequestDescriptor};
use crate::selector::NodeSelector;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Attempt budget and pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub retry_interval: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_attempts: config.attempt_budget().max(1),
            retry_interval: config.retry_interval(),
        }
    }
}

/// Runs a request through the transport until it gets a response, the budget
/// runs out, or the caller cancels
pub struct RetryCoordinator {
    transport: Transport,
    selector: Arc<NodeSelector>,
    policy: RetryPolicy,
}

impl RetryCoordinator {
    pub fn new(transport: Transport, selector: Arc<NodeSelector>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            selector,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute(
        &self,
        request: &RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<RawResponse> {
        let method = request.method().as_str();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let node = self.selector.next();
            debug!(node = %node, attempt, max_attempts, method, path = request.path(), "Sending request");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                outcome = self.transport.send(&node, request) => outcome,
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() => {
                    warn!(
                        node = %node,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Attempt failed"
                    );
                    last_error = Some(err);

                    if attempt < max_attempts {
                        metrics::record_retry(method);
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                            _ = tokio::time::sleep(self.policy.retry_interval) => {}
                        }
                    }
                }
                Err(err) => return Err(err),
            }
        }

        metrics::record_exhausted(method);
        let last = last_error.unwrap_or_else(|| ClientError::Network {
            node: "none".to_string(),
            message: "no attempt was made".to_string(),
        });
        Err(ClientError::ServiceUnavailable {
            attempts: max_attempts,
            last: Box::new(last),
        })
    }
}
