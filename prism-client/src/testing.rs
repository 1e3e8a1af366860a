//! Scripted backend for unit tests

use crate::config::{NodeConfig, Protocol};
use crate::node::Node;
use crate::request::{Body, Method, RawResponse, RequestDescriptor};
use crate::transport::{BackendError, HttpBackend};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

pub(crate) fn node_configs(hosts: &[&str]) -> Vec<NodeConfig> {
    hosts
        .iter()
        .map(|h| NodeConfig::new(*h, 3080, Protocol::Http))
        .collect()
}

#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Respond(u16, String),
    Fail(String),
    /// The request is refused before anything is sent
    Reject(String),
    /// Never answers within any test timeout
    Hang,
}

impl Outcome {
    pub(crate) fn respond(status: u16, body: &str) -> Self {
        Outcome::Respond(status, body.to_string())
    }

    pub(crate) fn fail(message: &str) -> Self {
        Outcome::Fail(message.to_string())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub host: String,
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
}

/// Answers per host: queued outcomes first, then the host's fallback
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    queued: Mutex<HashMap<String, VecDeque<Outcome>>>,
    fallback: Mutex<HashMap<String, Outcome>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn once(&self, host: &str, outcome: Outcome) {
        self.queued
            .lock()
            .entry(host.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub(crate) fn always(&self, host: &str, outcome: Outcome) {
        self.fallback.lock().insert(host.to_string(), outcome);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn hosts_called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.host.clone()).collect()
    }

    fn outcome_for(&self, host: &str) -> Outcome {
        if let Some(outcome) = self.queued.lock().get_mut(host).and_then(VecDeque::pop_front) {
            return outcome;
        }
        self.fallback
            .lock()
            .get(host)
            .cloned()
            .unwrap_or_else(|| Outcome::fail("no route to host"))
    }
}

#[async_trait]
impl HttpBackend for ScriptedBackend {
    async fn execute(
        &self,
        node: &Node,
        request: &RequestDescriptor,
        _timeout: Duration,
    ) -> Result<RawResponse, BackendError> {
        self.calls.lock().push(Call {
            host: node.host().to_string(),
            method: request.method(),
            path: request.path().to_string(),
            query: request.query().to_vec(),
            body: request.body().clone(),
        });

        match self.outcome_for(node.host()) {
            Outcome::Respond(status, body) => Ok(RawResponse::new(status, body)),
            Outcome::Fail(message) => Err(BackendError::Connect(message)),
            Outcome::Reject(message) => Err(BackendError::Request(message)),
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(BackendError::Timeout)
            }
        }
    }
}
