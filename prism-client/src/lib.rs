//! Prism Client - cluster-aware HTTP client for Prism search clusters
//!
//! Applications configure a set of nodes (and optionally a nearest node) and
//! issue requests without tracking which nodes are up.
//!
//! # Architecture
//!
//! - **Node directory**: configured nodes with per-node health state
//! - **Health policy**: cooldown rules deciding when a failed node is eligible
//! - **Selector**: round-robin rotation with health filtering and fallback
//! - **Transport**: one timed attempt against one node, reports reachability
//! - **Retry**: bounded attempts across nodes, network failures only
//! - **Codec**: newline-delimited bulk record format
//! - **Import/Export**: bulk document transfer with per-record outcomes
//!
//! # Example
//!
//! ```no_run
//! use prism_client::{ClientConfig, ImportOptions, NodeConfig, SearchClient};
//! use serde_json::json;
//!
//! # async fn run() -> prism_client::Result<()> {
//! let config = ClientConfig::with_nodes(vec![
//!     NodeConfig::from_url("http://search-1:3080")?,
//!     NodeConfig::from_url("http://search-2:3080")?,
//! ]);
//! let client = SearchClient::new(config)?;
//!
//! let books = client.collection("books").documents();
//! books
//!     .import(&[json!({"id": "1", "title": "Dune"})], &ImportOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod documents;
pub mod error;
pub mod export;
pub mod health;
pub mod import;
pub mod metrics;
pub mod node;
pub mod request;
pub mod retry;
pub mod selector;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::{ApiClient, ClientBuilder, RequestOptions, SearchClient};
pub use config::{ClientConfig, NodeConfig, Protocol};
pub use documents::{Collection, DeleteByFilterResponse, Documents, SearchDocuments, SearchParams};
pub use error::{ClientError, Result};
pub use export::ExportOptions;
pub use health::HealthPolicy;
pub use import::{
    DirtyValues, ImportAction, ImportExecutor, ImportFailure, ImportOptions, ImportRecordResult,
};
pub use node::{Node, NodeDirectory, NodeHealth, NodeStatus};
pub use request::{Body, Method, QueryParams, RawResponse, RequestDescriptor};
pub use retry::{RetryCoordinator, RetryPolicy};
pub use selector::NodeSelector;
pub use transport::{BackendError, HttpBackend, ReqwestBackend, Transport};
pub use tokio_util::sync::CancellationToken;
