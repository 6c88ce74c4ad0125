//! Error types for mlm-client.

/// Result type alias for mlm-client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mlm-client operations.
///
/// The rendered message starts with the attempted operation and target path
/// when they are known, followed by the error kind, e.g.
/// `GET /system/listSystems: Server error: HTTP 503 after 4 attempts`.
#[derive(Debug, thiserror::Error)]
#[error("{context}{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// What was being attempted when the error occurred.
    pub context: ErrorContext,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            context: ErrorContext::default(),
            source: Some(Box::new(source)),
        }
    }

    /// Record the operation and target path, keeping any already recorded.
    pub fn in_operation(mut self, operation: impl Into<String>, path: impl Into<String>) -> Self {
        if self.context.operation.is_none() {
            self.context.operation = Some(operation.into());
        }
        if self.context.path.is_none() {
            self.context.path = Some(path.into());
        }
        self
    }

    /// Record the parameter the failure relates to.
    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.context.parameter = Some(parameter.into());
        self
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.kind, ErrorKind::RateLimited { .. })
    }

    /// Returns true if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication(_))
    }

    /// Returns true if the server reported an application error in the body.
    pub fn is_api_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Api { .. })
    }

    /// Total number of attempts made, for errors raised after retrying.
    pub fn attempts(&self) -> Option<u32> {
        match &self.kind {
            ErrorKind::Transport { attempts, .. }
            | ErrorKind::RateLimited { attempts }
            | ErrorKind::Server { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// HTTP status associated with the error, if any.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::RateLimited { .. } => Some(429),
            ErrorKind::Server { status, .. } | ErrorKind::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Operation, path and parameter an error relates to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Operation name, e.g. `GET` or `login`.
    pub operation: Option<String>,
    /// Target API path.
    pub path: Option<String>,
    /// Offending parameter.
    pub parameter: Option<String>,
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.operation, &self.path) {
            (Some(op), Some(path)) => write!(f, "{} {}", op, path)?,
            (Some(op), None) => write!(f, "{}", op)?,
            (None, Some(path)) => write!(f, "{}", path)?,
            (None, None) => {
                if let Some(param) = &self.parameter {
                    write!(f, "[{}]: ", param)?;
                }
                return Ok(());
            }
        }
        if let Some(param) = &self.parameter {
            write!(f, " [{}]", param)?;
        }
        write!(f, ": ")
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Connection parameters are missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Login was rejected or malformed, or the server answered 401.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// No response was received, after every retry.
    #[error("Transport error after {attempts} attempts: {message}")]
    Transport { message: String, attempts: u32 },

    /// HTTP 429, after every retry.
    #[error("Rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// HTTP 5xx, after every retry.
    #[error("Server error: HTTP {status} after {attempts} attempts")]
    Server { status: u16, attempts: u32 },

    /// Non-retryable HTTP failure.
    #[error("HTTP error: {status} {message}")]
    Http { status: u16, message: String },

    /// Application failure reported in the body of a successful response.
    #[error("API error: {message}")]
    Api { message: String },

    /// The response body is not valid JSON.
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// The response does not have the shape the caller expected.
    #[error("Unexpected response shape: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    /// Returns true if this error kind is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Transport { .. } | ErrorKind::RateLimited { .. } | ErrorKind::Server { .. }
        )
    }
}

/// Check if an HTTP status code is retryable.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Parse(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(
            ErrorKind::Configuration(format!("Invalid URL: {}", err)),
            err,
        )
    }
}

impl From<mlm_auth::Error> for Error {
    fn from(err: mlm_auth::Error) -> Self {
        Error::with_source(ErrorKind::Configuration(err.to_string()), err)
    }
}
