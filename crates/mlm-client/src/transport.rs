//! The HTTP transport seam.
//!
//! [`Transport`] performs exactly one HTTP exchange. Retries, session
//! headers and response interpretation all live above it, so tests can
//! substitute a scripted transport for the real one.

use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use crate::error::{Error, ErrorKind, Result};
use crate::request::RequestBuilder;

/// Response metadata and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Status message, e.g. `Not Found`.
    pub reason: String,
    /// Response headers, in arrival order. Names are lower case.
    pub headers: Vec<(String, String)>,
    /// Raw body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Create an empty response with the given status.
    pub fn new(status: u16) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            reason,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
        self
    }

    /// Set the raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body.
    pub fn with_json(self, value: &serde_json::Value) -> Self {
        let body = value.to_string();
        self.with_header("content-type", "application/json")
            .with_body(body)
    }

    /// All values of a header, ignoring case.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A request that produced no response metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportFailure {
    /// What went wrong.
    pub message: String,
    /// Whether the request timed out.
    pub timed_out: bool,
}

impl TransportFailure {
    /// Create a failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Create a timeout failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

/// Performs a single HTTP exchange.
pub trait Transport: Send + Sync {
    /// Send the request and return the response, whatever its status.
    fn send(&self, request: &RequestBuilder) -> std::result::Result<HttpResponse, TransportFailure>;
}

/// Blocking transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Create a transport with the given timeout and TLS verification.
    pub fn new(timeout: Duration, validate_certs: bool) -> Result<Self> {
        let inner = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .danger_accept_invalid_certs(!validate_certs)
            .build()
            .map_err(|e| {
                Error::with_source(
                    ErrorKind::Configuration(format!("Failed to create HTTP client: {}", e)),
                    e,
                )
            })?;

        Ok(Self { inner })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &RequestBuilder) -> std::result::Result<HttpResponse, TransportFailure> {
        let mut req = self
            .inner
            .request(request.method().to_reqwest(), request.url());

        for (name, value) in request.headers() {
            req = req.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body() {
            req = req.body(body.to_string());
        }

        let response = req.send().map_err(failure_from)?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.bytes().map_err(failure_from)?;

        trace!(status = status.as_u16(), bytes = body.len(), "Response received");

        Ok(HttpResponse {
            status: status.as_u16(),
            reason,
            headers,
            body,
        })
    }
}

fn failure_from(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::timeout(err.to_string())
    } else {
        TransportFailure::new(err.to_string())
    }
}
