//! Search cluster client
//!
//! [`ApiClient`] is the single entry point resource wrappers use: they build
//! a path and query parameters and hand them to `perform_request` (or one of
//! the verb aliases). Node selection, retries and health tracking stay below
//! this boundary.

use crate::config::ClientConfig;
use crate::documents::Collection;
use crate::error::Result;
use crate::health::HealthPolicy;
use crate::node::{NodeDirectory, NodeStatus};
use crate::request::{Body, Method, QueryParams, RawResponse, RequestDescriptor};
use crate::retry::{RetryCoordinator, RetryPolicy};
use crate::selector::NodeSelector;
use crate::transport::{HttpBackend, ReqwestBackend, Transport};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument, Span};

/// Per-call options for [`ApiClient::perform_request`]
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: QueryParams,
    pub body: Body,
    pub headers: Vec<(String, String)>,
    /// Per-attempt timeout override
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

struct Inner {
    retry: RetryCoordinator,
    selector: Arc<NodeSelector>,
    span: Span,
}

/// Low-level client: method + path + options in, classified result out
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Create a client that talks HTTP through `reqwest`
    pub fn new(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new(config).build_api()
    }

    /// Create a client on top of a custom backend
    pub fn with_backend(config: ClientConfig, backend: Arc<dyn HttpBackend>) -> Result<Self> {
        ClientBuilder::new(config).backend(backend).build_api()
    }

    fn assemble(config: &ClientConfig, backend: Arc<dyn HttpBackend>, span: Span) -> Result<Self> {
        config.validate()?;

        let directory = NodeDirectory::from_config(config);
        let selector = Arc::new(NodeSelector::new(
            directory,
            HealthPolicy::new(config.healthcheck_interval()),
        )?);
        let transport = Transport::new(backend, Arc::clone(&selector), config.connection_timeout());
        let retry = RetryCoordinator::new(
            transport,
            Arc::clone(&selector),
            RetryPolicy::from_config(config),
        );

        span.in_scope(|| {
            info!(
                nodes = config.nodes.len(),
                nearest = config.nearest_node.is_some(),
                max_attempts = retry.policy().max_attempts,
                "Search client created"
            );
        });

        Ok(Self {
            inner: Arc::new(Inner {
                retry,
                selector,
                span,
            }),
        })
    }

    /// Run a prepared request; non-2xx responses become application errors
    pub async fn execute(
        &self,
        request: &RequestDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse> {
        let never;
        let cancel = match cancel {
            Some(token) => token,
            None => {
                never = CancellationToken::new();
                &never
            }
        };

        self.inner
            .retry
            .execute(request, cancel)
            .instrument(self.inner.span.clone())
            .await?
            .error_for_status()
    }

    pub async fn perform_request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<RawResponse> {
        let RequestOptions {
            query,
            body,
            headers,
            timeout,
            cancellation,
        } = options;

        let request = RequestDescriptor::new(method, path)
            .with_query(query)
            .with_body(body)
            .with_headers(headers)
            .with_timeout(timeout);

        self.execute(&request, cancellation.as_ref()).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: QueryParams) -> Result<T> {
        self.perform_request(
            Method::Get,
            path,
            RequestOptions {
                query,
                ..Default::default()
            },
        )
        .await?
        .json()
    }

    pub async fn post<B, T>(&self, path: &str, body: &B, query: QueryParams) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::Post, path, body, query).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B, query: QueryParams) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::Put, path, body, query).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B, query: QueryParams) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::Patch, path, body, query).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, query: QueryParams) -> Result<T> {
        self.perform_request(
            Method::Delete,
            path,
            RequestOptions {
                query,
                ..Default::default()
            },
        )
        .await?
        .json()
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B, query: QueryParams) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = Body::Json(serde_json::to_value(body)?);
        self.perform_request(
            method,
            path,
            RequestOptions {
                query,
                body,
                ..Default::default()
            },
        )
        .await?
        .json()
    }

    /// Health of every configured node, nearest first
    pub fn node_status(&self) -> Vec<NodeStatus> {
        self.inner.selector.status()
    }
}

/// Builder for [`SearchClient`] and [`ApiClient`]
pub struct ClientBuilder {
    config: ClientConfig,
    backend: Option<Arc<dyn HttpBackend>>,
    span: Option<Span>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            backend: None,
            span: None,
        }
    }

    /// Use a custom HTTP backend instead of `reqwest`
    pub fn backend(mut self, backend: Arc<dyn HttpBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Span every request of this client is recorded under
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> Result<SearchClient> {
        Ok(SearchClient {
            api: self.build_api()?,
        })
    }

    pub fn build_api(self) -> Result<ApiClient> {
        let backend = match self.backend {
            Some(backend) => backend,
            None => Arc::new(ReqwestBackend::new(&self.config)?),
        };
        let span = self
            .span
            .unwrap_or_else(|| tracing::info_span!("prism_client"));
        ApiClient::assemble(&self.config, backend, span)
    }
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    ok: bool,
}

/// Cluster-aware client for a Prism search cluster
#[derive(Clone)]
pub struct SearchClient {
    api: ApiClient,
}

impl SearchClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Request-level access for resources this crate does not wrap
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection::new(self.api.clone(), name.into())
    }

    /// Whether the cluster reports itself healthy via `GET /health`
    pub async fn health(&self) -> Result<bool> {
        let response: HealthResponse = self.api.get("/health", QueryParams::new()).await?;
        Ok(response.ok)
    }

    pub fn node_status(&self) -> Vec<NodeStatus> {
        self.api.node_status()
    }
}
