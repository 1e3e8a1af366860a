//! Bulk export
//!
//! The response body is already in the bulk wire format and is returned as
//! is. Export has no per-record outcomes to report.

use crate::request::{path_from_segments, push_param, Method, QueryParams, RequestDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Export query options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub filter_by: Option<String>,
    pub include_fields: Option<String>,
    pub exclude_fields: Option<String>,
    /// Parameters not covered above, appended verbatim
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ExportOptions {
    pub fn filtered(filter_by: impl Into<String>) -> Self {
        Self {
            filter_by: Some(filter_by.into()),
            ..Default::default()
        }
    }

    pub(crate) fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        push_param(&mut params, "filter_by", self.filter_by.as_deref());
        push_param(&mut params, "include_fields", self.include_fields.as_deref());
        push_param(&mut params, "exclude_fields", self.exclude_fields.as_deref());
        params.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }
}

pub(crate) fn export_request(collection: &str, options: &ExportOptions) -> RequestDescriptor {
    RequestDescriptor::new(
        Method::Get,
        path_from_segments(["collections", collection, "documents", "export"]),
    )
    .with_query(options.query_params())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_request_without_options() {
        let request = export_request("books", &ExportOptions::default());
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.path(), "/collections/books/documents/export");
        assert!(request.query().is_empty());
    }

    #[test]
    fn test_export_query_params() {
        let mut options = ExportOptions::filtered("year:>2000");
        options.exclude_fields = Some("embedding".to_string());
        options.extra.insert("limit".to_string(), "10".to_string());

        let request = export_request("books", &options);
        assert_eq!(
            request.query(),
            &[
                ("filter_by".to_string(), "year:>2000".to_string()),
                ("exclude_fields".to_string(), "embedding".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }
}
