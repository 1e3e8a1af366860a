//! Document operations for one collection
//!
//! [`SearchDocuments`] carries the read-only operations. [`Documents`] embeds
//! it and adds writes, so a read-only handle can be passed around without
//! exposing mutation.

use crate::client::ApiClient;
use crate::codec;
use crate::error::Result;
use crate::export::{export_request, ExportOptions};
use crate::import::{ImportExecutor, ImportOptions, ImportRecordResult};
use crate::request::{path_from_segments, push_param, Body, Method, QueryParams, RequestDescriptor};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Deref;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Handle to a named collection
#[derive(Clone)]
pub struct Collection {
    api: ApiClient,
    name: String,
}

impl Collection {
    pub(crate) fn new(api: ApiClient, name: String) -> Self {
        Self { api, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documents(&self) -> Documents {
        Documents {
            read: SearchDocuments {
                api: self.api.clone(),
                collection: self.name.clone(),
                cancellation: None,
            },
        }
    }

    /// Read-only view, for callers that must not write
    pub fn search_documents(&self) -> SearchDocuments {
        self.documents().read
    }
}

/// Search parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub query_by: Option<String>,
    pub filter_by: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub include_fields: Option<String>,
    pub exclude_fields: Option<String>,
    pub num_typos: Option<u32>,
    /// Parameters not covered above, appended verbatim
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl SearchParams {
    pub fn new(q: impl Into<String>, query_by: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            query_by: Some(query_by.into()),
            ..Default::default()
        }
    }

    fn query_params(&self) -> QueryParams {
        let mut params = vec![("q".to_string(), self.q.clone())];
        push_param(&mut params, "query_by", self.query_by.as_deref());
        push_param(&mut params, "filter_by", self.filter_by.as_deref());
        push_param(&mut params, "sort_by", self.sort_by.as_deref());
        push_param(&mut params, "page", self.page);
        push_param(&mut params, "per_page", self.per_page);
        push_param(&mut params, "include_fields", self.include_fields.as_deref());
        push_param(&mut params, "exclude_fields", self.exclude_fields.as_deref());
        push_param(&mut params, "num_typos", self.num_typos);
        params.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }
}

/// Response of a delete-by-filter call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DeleteByFilterResponse {
    pub num_deleted: u64,
}

/// Read-only document operations
#[derive(Clone)]
pub struct SearchDocuments {
    api: ApiClient,
    collection: String,
    cancellation: Option<CancellationToken>,
}

impl SearchDocuments {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Clone of this handle whose calls stop when `token` is cancelled
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancellation: Some(token),
            ..self.clone()
        }
    }

    fn path(&self, tail: &[&str]) -> String {
        let mut segments = vec!["collections", self.collection.as_str(), "documents"];
        segments.extend_from_slice(tail);
        path_from_segments(segments)
    }

    async fn run(&self, request: RequestDescriptor) -> Result<String> {
        Ok(self
            .api
            .execute(&request, self.cancellation.as_ref())
            .await?
            .body)
    }

    async fn run_json<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T> {
        let body = self.run(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn search<T: DeserializeOwned>(&self, params: &SearchParams) -> Result<T> {
        let request =
            RequestDescriptor::new(Method::Get, self.path(&["search"])).with_query(params.query_params());
        self.run_json(request).await
    }

    pub async fn retrieve<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        self.run_json(RequestDescriptor::new(Method::Get, self.path(&[id])))
            .await
    }

    /// Export documents; the service's response body is returned untouched
    pub async fn export(&self, options: &ExportOptions) -> Result<String> {
        self.run(export_request(&self.collection, options)).await
    }

    /// Export and decode every line into `T`
    pub async fn export_records<T: DeserializeOwned>(&self, options: &ExportOptions) -> Result<Vec<T>> {
        let text = self.export(options).await?;
        codec::decode(&text)
    }
}

/// Read-write document operations
#[derive(Clone)]
pub struct Documents {
    read: SearchDocuments,
}

impl Deref for Documents {
    type Target = SearchDocuments;

    fn deref(&self) -> &SearchDocuments {
        &self.read
    }
}

impl Documents {
    pub fn search_only(&self) -> SearchDocuments {
        self.read.clone()
    }

    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            read: self.read.with_cancellation(token),
        }
    }

    fn importer(&self) -> ImportExecutor {
        ImportExecutor::new(self.read.api.clone())
    }

    pub async fn create<T: Serialize + ?Sized>(&self, document: &T) -> Result<Value> {
        let request = RequestDescriptor::new(Method::Post, self.read.path(&[]))
            .with_body(Body::Json(serde_json::to_value(document)?));
        self.read.run_json(request).await
    }

    pub async fn upsert<T: Serialize + ?Sized>(&self, document: &T) -> Result<Value> {
        let request = RequestDescriptor::new(Method::Post, self.read.path(&[]))
            .with_query(vec![("action".to_string(), "upsert".to_string())])
            .with_body(Body::Json(serde_json::to_value(document)?));
        self.read.run_json(request).await
    }

    /// Partially update the document with `id`
    pub async fn update<T: Serialize + ?Sized>(&self, id: &str, partial: &T) -> Result<Value> {
        let request = RequestDescriptor::new(Method::Patch, self.read.path(&[id]))
            .with_body(Body::Json(serde_json::to_value(partial)?));
        self.read.run_json(request).await
    }

    pub async fn delete(&self, id: &str) -> Result<Value> {
        self.read
            .run_json(RequestDescriptor::new(Method::Delete, self.read.path(&[id])))
            .await
    }

    pub async fn delete_by_filter(
        &self,
        filter_by: &str,
        batch_size: Option<usize>,
    ) -> Result<DeleteByFilterResponse> {
        let mut query = vec![("filter_by".to_string(), filter_by.to_string())];
        push_param(&mut query, "batch_size", batch_size);
        let request = RequestDescriptor::new(Method::Delete, self.read.path(&[])).with_query(query);
        self.read.run_json(request).await
    }

    /// Import records; any per-record failure surfaces as `ClientError::Import`
    pub async fn import<T: Serialize>(
        &self,
        records: &[T],
        options: &ImportOptions,
    ) -> Result<Vec<ImportRecordResult>> {
        self.importer()
            .import(
                &self.read.collection,
                records,
                options,
                self.read.cancellation.as_ref(),
            )
            .await
    }

    /// Import pre-encoded bulk text and return the raw response text
    pub async fn import_raw(&self, text: impl Into<String>, options: &ImportOptions) -> Result<String> {
        self.importer()
            .import_raw(
                &self.read.collection,
                text,
                options,
                self.read.cancellation.as_ref(),
            )
            .await
    }

    #[deprecated(note = "use `Documents::import` instead")]
    pub async fn create_many<T: Serialize>(
        &self,
        records: &[T],
        options: &ImportOptions,
    ) -> Result<Vec<ImportRecordResult>> {
        warn!(
            collection = %self.read.collection,
            "create_many is deprecated, use import instead"
        );
        self.import(records, options).await
    }
}
