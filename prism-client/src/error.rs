//! Client error types
//!
//! Every operation either resolves with a typed result or fails with exactly
//! one of these kinds. Only [`ClientError::Network`] is retried internally.

use crate::import::ImportFailure;
use thiserror::Error;

/// Errors that can occur while talking to a search cluster
#[derive(Error, Debug)]
pub enum ClientError {
    /// Node unreachable or the attempt timed out
    #[error("Network error on {node}: {message}")]
    Network { node: String, message: String },

    /// Every attempt in the retry budget failed with a network error
    #[error("Service unavailable after {attempts} attempt(s): {last}")]
    ServiceUnavailable {
        attempts: usize,
        #[source]
        last: Box<ClientError>,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable entity: {0}")]
    Unprocessable(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Unexpected status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// A bulk-format line could not be decoded
    #[error("Malformed record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    /// One or more records of a structured import failed
    #[error("Import failed: {0}")]
    Import(ImportFailure),

    #[error("Import returned {actual} result(s) for {expected} record(s)")]
    ImportResultMismatch { expected: usize, actual: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Build an application error from a non-2xx status and response body.
    ///
    /// The service reports failures as `{"message": "..."}`; any other body is
    /// passed through as the message.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.to_string());

        match status {
            400 => ClientError::BadRequest(message),
            401 => ClientError::Unauthorized(message),
            404 => ClientError::NotFound(message),
            409 => ClientError::Conflict(message),
            422 => ClientError::Unprocessable(message),
            500..=599 => ClientError::ServerError { status, message },
            _ => ClientError::HttpStatus { status, message },
        }
    }

    /// Whether the retry loop may try another node after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network { .. })
    }

    /// HTTP status for application errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::BadRequest(_) => Some(400),
            ClientError::Unauthorized(_) => Some(401),
            ClientError::NotFound(_) => Some(404),
            ClientError::Conflict(_) => Some(409),
            ClientError::Unprocessable(_) => Some(422),
            ClientError::ServerError { status, .. } | ClientError::HttpStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            ClientError::Network { .. } => "network",
            ClientError::ServiceUnavailable { .. } => "service_unavailable",
            ClientError::BadRequest(_) => "bad_request",
            ClientError::Unauthorized(_) => "unauthorized",
            ClientError::NotFound(_) => "not_found",
            ClientError::Conflict(_) => "conflict",
            ClientError::Unprocessable(_) => "unprocessable",
            ClientError::ServerError { .. } => "server_error",
            ClientError::HttpStatus { .. } => "http_status",
            ClientError::MalformedRecord { .. } => "malformed_record",
            ClientError::Import(_) => "import",
            ClientError::ImportResultMismatch { .. } => "import_result_mismatch",
            ClientError::InvalidRequest(_) => "invalid_request",
            ClientError::Cancelled => "cancelled",
            ClientError::Config(_) => "config",
            ClientError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_uses_service_message() {
        let err = ClientError::from_status(404, r#"{"message": "Collection not found"}"#);
        assert!(matches!(err, ClientError::NotFound(ref m) if m == "Collection not found"));
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_from_status_falls_back_to_body() {
        let err = ClientError::from_status(400, "bad things");
        assert!(matches!(err, ClientError::BadRequest(ref m) if m == "bad things"));
    }

    #[test]
    fn test_from_status_mapping() {
        assert_eq!(ClientError::from_status(401, "").error_type(), "unauthorized");
        assert_eq!(ClientError::from_status(409, "").error_type(), "conflict");
        assert_eq!(ClientError::from_status(422, "").error_type(), "unprocessable");
        assert_eq!(ClientError::from_status(503, "").error_type(), "server_error");
        assert_eq!(ClientError::from_status(418, "").error_type(), "http_status");
        assert_eq!(ClientError::from_status(503, "").status(), Some(503));
    }

    #[test]
    fn test_only_network_errors_are_retryable() {
        let network = ClientError::Network {
            node: "http://a:8108".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(network.is_retryable());
        assert!(!ClientError::from_status(500, "").is_retryable());
        assert!(!ClientError::Cancelled.is_retryable());
    }

    #[test]
    fn test_service_unavailable_keeps_source() {
        use std::error::Error as _;

        let err = ClientError::ServiceUnavailable {
            attempts: 3,
            last: Box::new(ClientError::Network {
                node: "http://a:8108".to_string(),
                message: "timed out".to_string(),
            }),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("3 attempt(s)"));
    }
}
