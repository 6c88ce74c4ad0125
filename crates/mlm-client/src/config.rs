//! Client configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use mlm_auth::{CredentialResolver, Credentials, EnvSource, ExplicitCredentials, ProcessEnv};

use crate::endpoints::EndpointTable;
use crate::error::{Error, ErrorKind, Result};
use crate::mapping::FieldMappings;
use crate::retry::RetryConfig;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Paths where a 400 "already exists" answer counts as an empty success.
pub const DEFAULT_IDEMPOTENT_CREATE_PATHS: [&str; 1] = ["/contentmanagement/createProject"];

/// Explicit values supplied by the caller. Anything left unset falls back to
/// the environment, the profile store or the built-in default.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Explicit connection parameters.
    pub credentials: ExplicitCredentials,
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Retry behavior.
    pub retry: Option<RetryConfig>,
    /// Endpoint path overrides, keyed by endpoint name.
    pub endpoints: BTreeMap<String, String>,
    /// Field mapping tables.
    pub field_mappings: Option<FieldMappings>,
    /// Paths where a 400 "already exists" answer is an empty success.
    pub idempotent_create_paths: Option<Vec<String>>,
    /// Profile store location.
    pub profile_path: Option<PathBuf>,
    /// Skip the profile store entirely.
    pub skip_profile_store: bool,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.credentials.url = Some(url.into());
        self
    }

    /// Set the login name.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.credentials.username = Some(username.into());
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.credentials.password = Some(password.into());
        self
    }

    /// Select a profile store instance by name.
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.credentials.instance = Some(instance.into());
        self
    }

    /// Enable or disable TLS certificate verification.
    pub fn with_validate_certs(mut self, validate: bool) -> Self {
        self.credentials.validate_certs = Some(validate);
        self
    }

    /// Set the API base path.
    pub fn with_api_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.credentials.api_base_path = Some(base_path.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the number of retries, keeping the default backoff.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.retry = Some(self.retry.unwrap_or_default().with_max_retries(retries));
        self
    }

    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Override the path of one endpoint.
    pub fn with_endpoint(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.endpoints.insert(name.into(), path.into());
        self
    }

    /// Set the field mapping tables.
    pub fn with_field_mappings(mut self, mappings: FieldMappings) -> Self {
        self.field_mappings = Some(mappings);
        self
    }

    /// Set the paths where a 400 "already exists" answer is an empty success.
    pub fn with_idempotent_create_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.idempotent_create_paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Read the profile store from a custom location.
    pub fn with_profile_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_path = Some(path.into());
        self
    }

    /// Do not consult the profile store.
    pub fn without_profile_store(mut self) -> Self {
        self.skip_profile_store = true;
        self
    }
}

/// Resolved, immutable connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    credentials: Credentials,
    timeout: Duration,
    retry: RetryConfig,
    endpoints: EndpointTable,
    field_mappings: FieldMappings,
    idempotent_create_paths: Vec<String>,
}

impl ConnectionConfig {
    /// Resolve configuration from overrides, the process environment and
    /// the profile store.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        Self::resolve_with_env(overrides, ProcessEnv)
    }

    /// Resolve configuration using the given environment source.
    pub fn resolve_with_env(
        overrides: &ConfigOverrides,
        env: impl EnvSource + 'static,
    ) -> Result<Self> {
        let mut resolver = CredentialResolver::new(overrides.credentials.clone()).with_env(env);
        if overrides.skip_profile_store {
            resolver = resolver.without_profile_store();
        } else if let Some(path) = &overrides.profile_path {
            resolver = resolver.with_profile_path(path.clone());
        }

        let credentials = resolver.resolve()?;
        Self::from_credentials(credentials, overrides)
    }

    /// Build configuration around already resolved credentials.
    pub fn from_credentials(credentials: Credentials, overrides: &ConfigOverrides) -> Result<Self> {
        url::Url::parse(credentials.endpoint())
            .map_err(|e| Error::from(e).with_parameter("url"))?;

        let timeout = overrides.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(Error::new(ErrorKind::Configuration(
                "timeout must be greater than zero".to_string(),
            ))
            .with_parameter("timeout"));
        }

        let endpoints = EndpointTable::default().with_overrides(&overrides.endpoints)?;

        let idempotent_create_paths = overrides.idempotent_create_paths.clone().unwrap_or_else(|| {
            DEFAULT_IDEMPOTENT_CREATE_PATHS
                .iter()
                .map(|p| p.to_string())
                .collect()
        });

        Ok(Self {
            credentials,
            timeout,
            retry: overrides.retry.clone().unwrap_or_default(),
            endpoints,
            field_mappings: overrides.field_mappings.clone().unwrap_or_default(),
            idempotent_create_paths,
        })
    }

    /// Resolved credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Server URL with the API base path appended.
    pub fn endpoint(&self) -> &str {
        self.credentials.endpoint()
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retry configuration.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Endpoint paths.
    pub fn endpoints(&self) -> &EndpointTable {
        &self.endpoints
    }

    /// Field mapping tables.
    pub fn field_mappings(&self) -> &FieldMappings {
        &self.field_mappings
    }

    /// Paths where a 400 "already exists" answer is an empty success.
    pub fn idempotent_create_paths(&self) -> &[String] {
        &self.idempotent_create_paths
    }

    /// Returns true if `path` is an idempotent-create path.
    pub fn is_idempotent_create(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        self.idempotent_create_paths.iter().any(|p| p == path)
    }
}
