//! Error types for mlm-auth.
//!
//! Error messages never include the secret, only the names of fields.

/// Result type alias for mlm-auth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mlm-auth operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Names of the required fields that could not be resolved, if this is
    /// a missing-fields error.
    pub fn missing_fields(&self) -> &[String] {
        match &self.kind {
            ErrorKind::MissingFields(fields) => fields,
            _ => &[],
        }
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Required connection fields are missing from every source.
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// The credentials profile store could not be used.
    #[error("Profile store error: {0}")]
    ProfileStore(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::with_source(ErrorKind::Yaml(err.to_string()), err)
    }
}
