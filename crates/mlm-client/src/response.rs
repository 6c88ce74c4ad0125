//! Response normalization.
//!
//! The API wraps most payloads in an envelope such as
//! `{"success": true, "result": ...}` and reports some failures only in the
//! body of an HTTP 200. [`normalize`] unwraps the envelope, turns in-body
//! failures into errors and coerces the payload to the shape the caller
//! expects.

use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind, Result};

/// Shape a caller expects a response to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    /// A sequence of records. A single record is wrapped.
    List,
    /// A single record. An empty list or null becomes an empty record.
    Record,
    /// Whatever the server sent.
    #[default]
    Any,
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Shape::List => "list",
            Shape::Record => "record",
            Shape::Any => "any",
        })
    }
}

/// A response after envelope unwrapping and shape coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResponse {
    /// An ordered sequence of records.
    Records(Vec<Value>),
    /// A single record.
    Record(Map<String, Value>),
    /// A bare scalar, only produced for [`Shape::Any`].
    Scalar(Value),
    /// No content.
    Empty,
}

impl NormalizedResponse {
    /// The empty representation of a shape.
    pub fn empty(shape: Shape) -> Self {
        match shape {
            Shape::List => NormalizedResponse::Records(Vec::new()),
            Shape::Record => NormalizedResponse::Record(Map::new()),
            Shape::Any => NormalizedResponse::Empty,
        }
    }

    /// Returns true if there is no data.
    pub fn is_empty(&self) -> bool {
        match self {
            NormalizedResponse::Records(items) => items.is_empty(),
            NormalizedResponse::Record(map) => map.is_empty(),
            NormalizedResponse::Scalar(value) => value.is_null(),
            NormalizedResponse::Empty => true,
        }
    }

    /// Consume into a list of records. A single record becomes a one-element list.
    pub fn into_records(self) -> Vec<Value> {
        match self {
            NormalizedResponse::Records(items) => items,
            NormalizedResponse::Record(map) if map.is_empty() => Vec::new(),
            NormalizedResponse::Record(map) => vec![Value::Object(map)],
            NormalizedResponse::Scalar(Value::Null) | NormalizedResponse::Empty => Vec::new(),
            NormalizedResponse::Scalar(value) => vec![value],
        }
    }

    /// Consume into a single record, if this is one.
    pub fn into_record(self) -> Option<Map<String, Value>> {
        match self {
            NormalizedResponse::Record(map) => Some(map),
            _ => None,
        }
    }

    /// Consume into a plain JSON value.
    pub fn into_value(self) -> Value {
        match self {
            NormalizedResponse::Records(items) => Value::Array(items),
            NormalizedResponse::Record(map) => Value::Object(map),
            NormalizedResponse::Scalar(value) => value,
            NormalizedResponse::Empty => Value::Null,
        }
    }
}

/// Normalize a response body to the expected shape.
///
/// A blank body yields the empty representation of `shape`. A body that is
/// not JSON is a parse error.
pub fn normalize(body: &[u8], shape: Shape) -> Result<NormalizedResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(NormalizedResponse::empty(shape));
    }

    let value: Value = serde_json::from_slice(body)?;
    normalize_value(value, shape)
}

/// Normalize an already parsed value to the expected shape.
pub fn normalize_value(value: Value, shape: Shape) -> Result<NormalizedResponse> {
    let value = match value {
        Value::Object(mut envelope) if envelope.contains_key("result") => {
            check_application_error(&envelope)?;
            envelope.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    };

    if let Value::Object(map) = &value {
        check_application_error(map)?;
    }

    coerce(value, shape)
}

fn coerce(value: Value, shape: Shape) -> Result<NormalizedResponse> {
    match (shape, value) {
        (Shape::List, Value::Array(items)) => Ok(NormalizedResponse::Records(items)),
        (Shape::List, Value::Object(map)) => Ok(NormalizedResponse::Records(vec![Value::Object(map)])),
        (Shape::List, Value::Null) => Ok(NormalizedResponse::Records(Vec::new())),

        (Shape::Record, Value::Object(map)) => Ok(NormalizedResponse::Record(map)),
        (Shape::Record, Value::Null) => Ok(NormalizedResponse::Record(Map::new())),
        (Shape::Record, Value::Array(items)) if items.is_empty() => {
            Ok(NormalizedResponse::Record(Map::new()))
        }

        (Shape::Any, Value::Array(items)) => Ok(NormalizedResponse::Records(items)),
        (Shape::Any, Value::Object(map)) => Ok(NormalizedResponse::Record(map)),
        (Shape::Any, Value::Null) => Ok(NormalizedResponse::Empty),
        (Shape::Any, scalar) => Ok(NormalizedResponse::Scalar(scalar)),

        (expected, actual) => Err(Error::new(ErrorKind::TypeMismatch {
            expected: expected.to_string(),
            actual: value_kind(&actual).to_string(),
        })),
    }
}

/// Fail if the mapping reports an application error.
fn check_application_error(map: &Map<String, Value>) -> Result<()> {
    if map.get("success") == Some(&Value::Bool(false)) {
        return Err(Error::new(ErrorKind::Api {
            message: envelope_message(map).unwrap_or_else(|| "Unknown API error".to_string()),
        }));
    }

    match map.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(()),
        Some(Value::String(s)) if s.is_empty() => Ok(()),
        Some(Value::String(s)) => Err(Error::new(ErrorKind::Api { message: s.clone() })),
        Some(other) => Err(Error::new(ErrorKind::Api {
            message: other.to_string(),
        })),
    }
}

/// Server-supplied message of an envelope: `message`, or the joined `messages`.
pub(crate) fn envelope_message(map: &Map<String, Value>) -> Option<String> {
    match map.get("message") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        _ => {}
    }

    match map.get("messages") {
        Some(Value::Array(items)) if !items.is_empty() => Some(
            items
                .iter()
                .map(|m| match m {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "record",
    }
}

/// Sanitize an error message before it is surfaced or logged.
///
/// Session cookie values are redacted and long messages are truncated.
pub fn sanitize_error_message(message: &str) -> String {
    const MAX_LENGTH: usize = 500;

    let cookie_pattern =
        regex_lite::Regex::new(r"(?i)(pxt-session-cookie|JSESSIONID)=[^;\s,]+").ok();
    let mut sanitized = match cookie_pattern {
        Some(re) => re.replace_all(message, "$1=[REDACTED]").to_string(),
        None => message.to_string(),
    };

    let password_pattern =
        regex_lite::Regex::new(r#"(?i)"password"\s*:\s*"[^"]*""#).ok();
    if let Some(re) = password_pattern {
        sanitized = re
            .replace_all(&sanitized, r#""password":"[REDACTED]""#)
            .to_string();
    }

    if sanitized.len() > MAX_LENGTH {
        let mut end = MAX_LENGTH;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized.truncate(end);
        sanitized.push_str("...[truncated]");
    }

    sanitized
}
