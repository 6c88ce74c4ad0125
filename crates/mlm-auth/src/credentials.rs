//! Connection parameter resolution.
//!
//! Each field is resolved on its own, in this order:
//!
//! 1. an explicit, non-empty value supplied by the caller
//! 2. the matching environment variable
//! 3. the selected instance of the credentials profile store
//!
//! All credential types implement custom Debug to redact the password.

use std::path::PathBuf;

use crate::env::{
    EnvSource, ProcessEnv, ENV_MLM_API_BASE_PATH, ENV_MLM_PASSWORD, ENV_MLM_URL,
    ENV_MLM_USERNAME,
};
use crate::error::{Error, ErrorKind, Result};
use crate::profile::{InstanceProfile, ProfileStore};
use crate::DEFAULT_API_BASE_PATH;

/// Connection parameters supplied explicitly by the caller.
#[derive(Clone, Default)]
pub struct ExplicitCredentials {
    /// Server URL.
    pub url: Option<String>,
    /// Login name.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Name of the profile store instance to use.
    pub instance: Option<String>,
    /// Whether to verify TLS certificates.
    pub validate_certs: Option<bool>,
    /// API base path appended to the server URL.
    pub api_base_path: Option<String>,
}

impl std::fmt::Debug for ExplicitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplicitCredentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("instance", &self.instance)
            .field("validate_certs", &self.validate_certs)
            .field("api_base_path", &self.api_base_path)
            .finish()
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialTier {
    /// Supplied by the caller.
    Explicit,
    /// Read from an environment variable.
    Environment,
    /// Read from the credentials profile store.
    Profile,
    /// Built-in default.
    Default,
}

/// Fully resolved connection parameters.
///
/// The password is redacted in Debug output.
#[derive(Clone)]
pub struct Credentials {
    endpoint: String,
    username: String,
    password: String,
    validate_certs: bool,
    base_path: String,
    instance: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("validate_certs", &self.validate_certs)
            .field("base_path", &self.base_path)
            .field("instance", &self.instance)
            .finish()
    }
}

impl Credentials {
    /// Create credentials from already known values.
    ///
    /// The endpoint is normalized against `base_path` the same way resolved
    /// endpoints are.
    pub fn new(
        url: impl AsRef<str>,
        username: impl Into<String>,
        password: impl Into<String>,
        base_path: impl AsRef<str>,
    ) -> Self {
        let base_path = normalize_base_path(base_path.as_ref());
        Self {
            endpoint: normalize_endpoint(url.as_ref(), &base_path),
            username: username.into(),
            password: password.into(),
            validate_certs: true,
            base_path,
            instance: None,
        }
    }

    /// Set whether TLS certificates are verified.
    pub fn with_validate_certs(mut self, validate: bool) -> Self {
        self.validate_certs = validate;
        self
    }

    /// The API endpoint: server URL with the base path appended.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The login name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether TLS certificates are verified.
    pub fn validate_certs(&self) -> bool {
        self.validate_certs
    }

    /// The API base path.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// The profile store instance that contributed values, if any.
    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }
}

/// Where the profile store is read from.
#[derive(Debug, Clone)]
enum ProfileSource {
    DefaultPath,
    Path(PathBuf),
    Store(ProfileStore),
    Disabled,
}

/// Resolves [`Credentials`] from explicit values, the environment and the
/// profile store.
pub struct CredentialResolver {
    explicit: ExplicitCredentials,
    env: Box<dyn EnvSource>,
    profile: ProfileSource,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("explicit", &self.explicit)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl CredentialResolver {
    /// Create a resolver reading the process environment and the default
    /// profile store location.
    pub fn new(explicit: ExplicitCredentials) -> Self {
        Self {
            explicit,
            env: Box::new(ProcessEnv),
            profile: ProfileSource::DefaultPath,
        }
    }

    /// Use a different environment source.
    pub fn with_env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Read the profile store from a custom path.
    pub fn with_profile_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile = ProfileSource::Path(path.into());
        self
    }

    /// Use an already loaded profile store.
    pub fn with_profile_store(mut self, store: ProfileStore) -> Self {
        self.profile = ProfileSource::Store(store);
        self
    }

    /// Do not consult any profile store.
    pub fn without_profile_store(mut self) -> Self {
        self.profile = ProfileSource::Disabled;
        self
    }

    /// Resolve the connection parameters.
    ///
    /// Fails with [`ErrorKind::MissingFields`] naming every required field
    /// (url, username, password) that no source supplied.
    pub fn resolve(&self) -> Result<Credentials> {
        let store = self.load_profile_store();
        let selected = store
            .as_ref()
            .and_then(|s| s.select(self.explicit.instance.as_deref()));
        let (instance, profile) = match selected {
            Some((name, profile)) => (Some(name.to_string()), Some(profile)),
            None => (None, None),
        };

        let url = self.pick(
            &self.explicit.url,
            ENV_MLM_URL,
            profile.and_then(|p| p.url.as_ref()),
        );
        let username = self.pick(
            &self.explicit.username,
            ENV_MLM_USERNAME,
            profile.and_then(|p| p.username.as_ref()),
        );
        let password = self.pick(
            &self.explicit.password,
            ENV_MLM_PASSWORD,
            profile.and_then(|p| p.password.as_ref()),
        );
        let (validate_certs, certs_tier) = self.validate_certs(profile);
        let base_path = non_empty(&self.explicit.api_base_path)
            .or_else(|| self.env.var(ENV_MLM_API_BASE_PATH))
            .unwrap_or_else(|| DEFAULT_API_BASE_PATH.to_string());

        let mut missing = Vec::new();
        if url.is_none() {
            missing.push(format!("url (or {} environment variable)", ENV_MLM_URL));
        }
        if username.is_none() {
            missing.push(format!(
                "username (or {} environment variable)",
                ENV_MLM_USERNAME
            ));
        }
        if password.is_none() {
            missing.push(format!(
                "password (or {} environment variable)",
                ENV_MLM_PASSWORD
            ));
        }

        let (Some((url, url_tier)), Some((username, user_tier)), Some((password, _))) =
            (url, username, password)
        else {
            return Err(Error::new(ErrorKind::MissingFields(missing)));
        };

        let base_path = normalize_base_path(&base_path);
        let endpoint = normalize_endpoint(&url, &base_path);

        tracing::debug!(
            endpoint = %endpoint,
            username = %username,
            instance = ?instance,
            url_source = ?url_tier,
            username_source = ?user_tier,
            validate_certs_source = ?certs_tier,
            "Resolved connection parameters"
        );

        Ok(Credentials {
            endpoint,
            username,
            password,
            validate_certs,
            base_path,
            instance,
        })
    }

    fn load_profile_store(&self) -> Option<ProfileStore> {
        let loaded = match &self.profile {
            ProfileSource::Disabled => return None,
            ProfileSource::Store(store) => return Some(store.clone()),
            ProfileSource::DefaultPath => ProfileStore::load_default(),
            ProfileSource::Path(path) => ProfileStore::load(path),
        };

        match loaded {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unusable credentials file");
                None
            }
        }
    }

    fn pick(
        &self,
        explicit: &Option<String>,
        env_var: &str,
        profile: Option<&String>,
    ) -> Option<(String, CredentialTier)> {
        if let Some(value) = non_empty(explicit) {
            return Some((value, CredentialTier::Explicit));
        }
        if let Some(value) = self.env.var(env_var) {
            return Some((value, CredentialTier::Environment));
        }
        profile
            .filter(|v| !v.is_empty())
            .map(|v| (v.clone(), CredentialTier::Profile))
    }

    fn validate_certs(&self, profile: Option<&InstanceProfile>) -> (bool, CredentialTier) {
        if let Some(flag) = self.explicit.validate_certs {
            return (flag, CredentialTier::Explicit);
        }
        if let Some(flag) = profile.and_then(|p| p.validate_certs) {
            return (flag, CredentialTier::Profile);
        }
        (true, CredentialTier::Default)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Ensure a base path has a leading slash and no trailing slash.
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Strip trailing slashes from `url` and append `base_path` unless the URL
/// already ends with it.
pub fn normalize_endpoint(url: &str, base_path: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if base_path.is_empty() || url.ends_with(base_path) {
        url.to_string()
    } else {
        format!("{}{}", url, base_path)
    }
}
