//! Single-attempt HTTP transport
//!
//! Sends one request to one node under a deadline and reports reachability
//! back to the selector. Any received response counts as reachable, whatever
//! its status; only connection failures and timeouts mark a node unhealthy.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::metrics::AttemptTimer;
use crate::node::Node;
use crate::request::{Body, Method, RawResponse, RequestDescriptor};
use crate::selector::NodeSelector;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure to obtain any response from a node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out")]
    Timeout,

    #[error("{0}")]
    Io(String),

    /// The request could not be built; no node was contacted
    #[error("invalid request: {0}")]
    Request(String),
}

impl BackendError {
    /// Short reason for metrics labeling
    pub fn reason(&self) -> &'static str {
        match self {
            BackendError::Connect(_) => "connect",
            BackendError::Timeout => "timeout",
            BackendError::Io(_) => "io",
            BackendError::Request(_) => "request",
        }
    }
}

/// Network I/O for a single request
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Issue `request` against `node`. Returns a response for any HTTP status
    async fn execute(
        &self,
        node: &Node,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, BackendError>;
}

/// `reqwest`-based backend
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    /// Build a backend with the API key and additional headers from `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(api_key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| ClientError::Config(format!("Invalid API key: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        for (name, value) in &config.additional_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::Config(format!("Invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::Config(format!("Invalid value for header '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connection_timeout())
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wrap an already configured `reqwest::Client`
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn classify(err: reqwest::Error) -> BackendError {
    if err.is_builder() {
        BackendError::Request(err.to_string())
    } else if err.is_timeout() {
        BackendError::Timeout
    } else if err.is_connect() {
        BackendError::Connect(err.to_string())
    } else {
        BackendError::Io(err.to_string())
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(
        &self,
        node: &Node,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, BackendError> {
        let mut builder = self
            .client
            .request(reqwest_method(request.method()), node.url(request.path()))
            .timeout(timeout);

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body() {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Text {
                content,
                content_type,
            } => builder
                .header(CONTENT_TYPE, content_type.as_str())
                .body(content.clone()),
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(classify)?;

        Ok(RawResponse {
            status,
            body,
            content_type,
        })
    }
}

/// Executes one attempt and records its outcome in node health
pub struct Transport {
    backend: Arc<dyn HttpBackend>,
    selector: Arc<NodeSelector>,
    timeout: Duration,
}

impl Transport {
    pub fn new(backend: Arc<dyn HttpBackend>, selector: Arc<NodeSelector>, timeout: Duration) -> Self {
        Self {
            backend,
            selector,
            timeout,
        }
    }

    /// Send `request` to `node`.
    ///
    /// Non-2xx responses are returned as `Ok`; classifying them is left to the
    /// caller. Health is updated after the attempt completes, never while the
    /// request is in flight. Dropping the future mid-attempt, or a request
    /// that could not be built, leaves health untouched.
    pub async fn send(&self, node: &Node, request: &RequestDescriptor) -> Result<RawResponse> {
        let timeout = request.timeout().unwrap_or(self.timeout);
        let method = request.method().as_str();
        let timer = AttemptTimer::new(method, node);

        let outcome =
            match tokio::time::timeout(timeout, self.backend.execute(node, request, timeout)).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout),
            };

        match outcome {
            Ok(response) => {
                self.selector.report_success(node);
                timer.response(response.status);
                debug!(
                    node = %node,
                    method,
                    path = request.path(),
                    status = response.status,
                    "Received response"
                );
                Ok(response)
            }
            Err(BackendError::Request(message)) => {
                timer.failure("request");
                warn!(
                    node = %node,
                    method,
                    path = request.path(),
                    error = %message,
                    "Request could not be built"
                );
                Err(ClientError::InvalidRequest(message))
            }
            Err(err) => {
                self.selector.report_failure(node);
                timer.failure(err.reason());
                warn!(
                    node = %node,
                    method,
                    path = request.path(),
                    error = %err,
                    "Request attempt failed"
                );
                let message = match err {
                    BackendError::Timeout => format!("timed out after {}ms", timeout.as_millis()),
                    other => other.to_string(),
                };
                Err(ClientError::Network {
                    node: node.to_string(),
                    message,
                })
            }
        }
    }
}
