//! Node eligibility rules
//!
//! Pure decision logic over a node's recorded health:
//!
//! ```text
//! healthy ──failure──► unhealthy(since) ──cooldown elapsed──► eligible
//!    ▲                                                          │
//!    └──────────────────────── response ◄───────────────────────┘
//! ```
//!
//! A node that is eligible again after its cooldown stays marked unhealthy
//! until a response from it is observed.

use crate::node::NodeHealth;
use std::time::{Duration, Instant};

/// Cooldown-based health policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    cooldown: Duration,
}

impl HealthPolicy {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether a node may be selected at `now`
    pub fn is_eligible(&self, health: &NodeHealth, now: Instant) -> bool {
        if health.healthy {
            return true;
        }
        match self.next_eligible_at(health) {
            Some(at) => now >= at,
            None => true,
        }
    }

    /// When a failed node becomes selectable again, `None` if it already is
    pub fn next_eligible_at(&self, health: &NodeHealth) -> Option<Instant> {
        if health.healthy {
            return None;
        }
        health.unhealthy_since.map(|since| since + self.cooldown)
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
