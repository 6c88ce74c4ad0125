//! Error types for mlm-inventory.

/// Result type alias for inventory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for inventory operations.
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
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// The inventory options file could not be read or parsed.
    #[error("Invalid inventory options: {0}")]
    Options(String),

    /// Fetching systems from the server failed.
    #[error("Error fetching systems from MLM API: {0}")]
    Fetch(String),

    /// The requested host is not in the inventory.
    #[error("Host not found in inventory: {0}")]
    UnknownHost(String),
}

impl From<mlm_client::Error> for Error {
    fn from(err: mlm_client::Error) -> Self {
        Error::with_source(ErrorKind::Fetch(err.to_string()), err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::with_source(ErrorKind::Options(err.to_string()), err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Options(err.to_string()), err)
    }
}
