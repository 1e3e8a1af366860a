//! Request descriptors and raw responses
//!
//! A [`RequestDescriptor`] is built once per call and shared by reference
//! across every retry attempt; nothing in the retry path mutates it.

use crate::error::{ClientError, Result};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered query parameters, passed through verbatim
pub type QueryParams = Vec<(String, String)>;

/// Request payload
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(serde_json::Value),
    Text {
        content: String,
        content_type: String,
    },
}

impl Body {
    /// Newline-delimited bulk payload
    pub fn bulk(content: impl Into<String>) -> Self {
        Body::Text {
            content: content.into(),
            content_type: "text/plain".to_string(),
        }
    }
}

/// Everything needed to issue one logical request against any node
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: QueryParams,
    body: Body,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query.extend(query);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Per-attempt timeout override
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Response as received from a node, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub content_type: Option<String>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into the matching application error
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::from_status(self.status, &self.body))
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Build a request path from raw segments, percent-encoding each one
pub fn path_from_segments<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut path = String::new();
    for segment in segments {
        path.push('/');
        let encoded: String = url::form_urlencoded::byte_serialize(segment.as_ref().as_bytes()).collect();
        path.push_str(&encoded.replace('+', "%20"));
    }
    path
}

/// Append `key=value` when the value is present
pub(crate) fn push_param<V: ToString>(params: &mut QueryParams, key: &str, value: Option<V>) {
    if let Some(value) = value {
        params.push((key.to_string(), value.to_string()));
    }
}
