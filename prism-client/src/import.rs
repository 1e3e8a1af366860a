//! Bulk import
//!
//! Two modes:
//! - raw: pre-encoded text goes out unmodified and the response text comes
//!   back unmodified
//! - structured: records are encoded, sent, and each result line is decoded
//!   and lined up with its input record by position

use crate::client::ApiClient;
use crate::codec;
use crate::error::{ClientError, Result};
use crate::metrics;
use crate::request::{path_from_segments, push_param, Body, Method, QueryParams, RequestDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Write mode for imported documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportAction {
    Create,
    Upsert,
    Update,
    Emplace,
}

impl ImportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportAction::Create => "create",
            ImportAction::Upsert => "upsert",
            ImportAction::Update => "update",
            ImportAction::Emplace => "emplace",
        }
    }
}

impl fmt::Display for ImportAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the service treats field values that do not match the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyValues {
    CoerceOrReject,
    CoerceOrDrop,
    Drop,
    Reject,
}

impl DirtyValues {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirtyValues::CoerceOrReject => "coerce_or_reject",
            DirtyValues::CoerceOrDrop => "coerce_or_drop",
            DirtyValues::Drop => "drop",
            DirtyValues::Reject => "reject",
        }
    }
}

impl fmt::Display for DirtyValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Import query options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub action: Option<ImportAction>,
    pub batch_size: Option<usize>,
    pub dirty_values: Option<DirtyValues>,
    pub return_id: Option<bool>,
    pub return_doc: Option<bool>,
    pub remote_embedding_batch_size: Option<usize>,
    /// Parameters not covered above, appended verbatim
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ImportOptions {
    pub fn with_action(action: ImportAction) -> Self {
        Self {
            action: Some(action),
            ..Default::default()
        }
    }

    pub(crate) fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        push_param(&mut params, "action", self.action);
        push_param(&mut params, "batch_size", self.batch_size);
        push_param(&mut params, "dirty_values", self.dirty_values);
        push_param(&mut params, "return_id", self.return_id);
        push_param(&mut params, "return_doc", self.return_doc);
        push_param(
            &mut params,
            "remote_embedding_batch_size",
            self.remote_embedding_batch_size,
        );
        params.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }
}

/// Outcome of one imported record.
///
/// Built only from the service's result lines, where `success` decides the
/// variant; see [`decode_results`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImportRecordResult {
    Success {
        id: Option<String>,
        document: Option<Value>,
    },
    Failure {
        error: String,
        code: u16,
        /// The input record as echoed by the service
        document: Value,
    },
}

impl ImportRecordResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ImportRecordResult::Success { .. })
    }
}

/// One result line as sent by the service
#[derive(Debug, Deserialize)]
struct ResultLine {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    document: Option<Value>,
    #[serde(default)]
    id: Option<String>,
}

impl From<ResultLine> for ImportRecordResult {
    fn from(line: ResultLine) -> Self {
        if line.success == Some(false) {
            ImportRecordResult::Failure {
                error: line.error.unwrap_or_default(),
                code: line.code.unwrap_or(0),
                document: line.document.unwrap_or(Value::Null),
            }
        } else {
            ImportRecordResult::Success {
                id: line.id,
                document: line.document,
            }
        }
    }
}

/// Decode the per-record result stream of an import response
pub fn decode_results(text: &str) -> Result<Vec<ImportRecordResult>> {
    Ok(codec::decode::<ResultLine>(text)?
        .into_iter()
        .map(ImportRecordResult::from)
        .collect())
}

/// Partial failure of a structured import.
///
/// Holds the complete ordered result sequence, successes included, so each
/// input record can be matched to its outcome by position.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportFailure {
    results: Vec<ImportRecordResult>,
    succeeded: usize,
    failed: usize,
}

impl ImportFailure {
    fn new(results: Vec<ImportRecordResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - succeeded;
        Self {
            results,
            succeeded,
            failed,
        }
    }

    pub fn results(&self) -> &[ImportRecordResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ImportRecordResult> {
        self.results
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Failed results with their input positions
    pub fn failures(&self) -> impl Iterator<Item = (usize, &ImportRecordResult)> {
        self.results.iter().enumerate().filter(|(_, r)| !r.is_success())
    }

    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded, self.failed)
    }
}

impl fmt::Display for ImportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Return the results when every record succeeded, otherwise the aggregate
/// error carrying all of them
pub fn partition(results: Vec<ImportRecordResult>, expected: usize) -> Result<Vec<ImportRecordResult>> {
    if results.len() != expected {
        return Err(ClientError::ImportResultMismatch {
            expected,
            actual: results.len(),
        });
    }

    if results.iter().all(ImportRecordResult::is_success) {
        metrics::record_import_results(results.len(), 0);
        return Ok(results);
    }

    let failure = ImportFailure::new(results);
    metrics::record_import_results(failure.succeeded(), failure.failed());
    Err(ClientError::Import(failure))
}

pub(crate) fn import_request(collection: &str, options: &ImportOptions, body: String) -> RequestDescriptor {
    RequestDescriptor::new(
        Method::Post,
        path_from_segments(["collections", collection, "documents", "import"]),
    )
    .with_query(options.query_params())
    .with_body(Body::bulk(body))
}

/// Drives bulk writes through the retrying client
#[derive(Clone)]
pub struct ImportExecutor {
    api: ApiClient,
}

impl ImportExecutor {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Send pre-encoded text and return the response text untouched
    pub async fn import_raw(
        &self,
        collection: &str,
        text: impl Into<String>,
        options: &ImportOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let request = import_request(collection, options, text.into());
        let response = self.api.execute(&request, cancel).await?;
        debug!(collection, bytes = response.body.len(), "Raw import finished");
        Ok(response.body)
    }

    /// Import structured records and report the outcome of each one
    pub async fn import<T: Serialize>(
        &self,
        collection: &str,
        records: &[T],
        options: &ImportOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<ImportRecordResult>> {
        if records.is_empty() {
            return Err(ClientError::InvalidRequest(
                "no documents provided for import".to_string(),
            ));
        }

        let body = codec::encode(records)?;
        let request = import_request(collection, options, body);
        let response = self.api.execute(&request, cancel).await?;
        let results = decode_results(&response.body)?;

        match partition(results, records.len()) {
            Ok(results) => {
                info!(collection, records = results.len(), "Import succeeded");
                Ok(results)
            }
            Err(ClientError::Import(failure)) => {
                warn!(collection, summary = %failure.summary(), "Import finished with failures");
                Err(ClientError::Import(failure))
            }
            Err(err) => Err(err),
        }
    }
}
