//! HTTP transport port.
//!
//! The service never talks to an HTTP library directly; it builds an
//! [`HttpRequest`] and hands it to an [`HttpTransport`]. This keeps the
//! classification policy independent of the client library and lets tests
//! script server behaviour.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// HTTP method used by the portal protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
    /// A single file sent as multipart form data.
    File {
        field: String,
        file_name: String,
        contents: Vec<u8>,
    },
}

/// A fully built request, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub body: RequestBody,
    /// Read timeout for this request; `None` uses the transport default.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    #[must_use]
    pub fn post(url: Url, body: RequestBody) -> Self {
        Self {
            method: Method::Post,
            url,
            body,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Look up a query parameter by name.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// Response status and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A 200 response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }
}

/// Failures below the HTTP layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection or read timed out.
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Executes HTTP requests against the portal server.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute one request and return the raw response.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
