//! Request descriptions: the caller-facing [`ApiCall`] and the wire-level
//! [`RequestBuilder`] handed to a transport.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::response::Shape;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RequestMethod {
    /// Convert to reqwest::Method.
    pub fn to_reqwest(&self) -> reqwest::Method {
        match self {
            RequestMethod::Get => reqwest::Method::GET,
            RequestMethod::Post => reqwest::Method::POST,
            RequestMethod::Put => reqwest::Method::PUT,
            RequestMethod::Delete => reqwest::Method::DELETE,
        }
    }

    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved HTTP request, ready for a [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    pub(crate) method: RequestMethod,
    pub(crate) url: String,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) body: Option<serde_json::Value>,
}

impl RequestBuilder {
    /// Create a new request builder.
    pub fn new(method: RequestMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Add a header, replacing any header of the same name in any case.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    /// Set raw JSON body. Adds `Content-Type: application/json` unless a
    /// content type is already set.
    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        if self.header_value("Content-Type").is_none() {
            self.headers
                .insert("Content-Type".to_string(), "application/json".to_string());
        }
        self
    }

    /// Request method.
    pub fn method(&self) -> RequestMethod {
        self.method
    }

    /// Absolute request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// All headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Look up a header, ignoring case.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// JSON body, if any.
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }
}

/// A call against the API, relative to the configured endpoint.
///
/// ```
/// use mlm_client::{ApiCall, Shape};
///
/// let call = ApiCall::get("/system/getRelevantErrata")
///     .param("sid", 1000010000)
///     .expect(Shape::List);
/// assert_eq!(call.target(), "/system/getRelevantErrata?sid=1000010000");
/// ```
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub(crate) method: RequestMethod,
    pub(crate) path: String,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) shape: Shape,
}

impl ApiCall {
    /// Create a call with the given method and path.
    pub fn new(method: RequestMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            headers: Vec::new(),
            body: None,
            shape: Shape::Any,
        }
    }

    /// GET call.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(RequestMethod::Get, path)
    }

    /// POST call.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(RequestMethod::Post, path)
    }

    /// PUT call.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(RequestMethod::Put, path)
    }

    /// DELETE call.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(RequestMethod::Delete, path)
    }

    /// Add a query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Add a header. A `Cookie` header set here replaces the session cookie.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set raw JSON body.
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set JSON body from any serializable value.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Set the shape the response is coerced to.
    pub fn expect(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    /// Request method.
    pub fn method(&self) -> RequestMethod {
        self.method
    }

    /// Path without query parameters.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path with the query parameters appended.
    pub fn target(&self) -> String {
        append_query(&self.path, &self.params)
    }
}

/// Append URL-encoded query parameters to a path.
///
/// Parameters join an existing query string with `&`.
pub fn append_query(path: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();

    let separator = if !path.contains('?') {
        "?"
    } else if path.ends_with('?') || path.ends_with('&') {
        ""
    } else {
        "&"
    };
    format!("{}{}{}", path, separator, query)
}
