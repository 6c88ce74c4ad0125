//! Credentials profile store.
//!
//! The store is a YAML document with a `default` instance name and an
//! `instances` mapping:
//!
//! ```yaml
//! default: production
//! instances:
//!   production:
//!     url: https://mlm.example.com
//!     username: admin
//!     password: secret
//!     validate_certs: true
//! ```
//!
//! This crate only ever reads the file.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, ErrorKind, Result};

/// A named set of connection parameters.
///
/// The password is redacted in Debug output.
#[derive(Clone, Default, Deserialize)]
pub struct InstanceProfile {
    /// Server URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Login name.
    #[serde(default)]
    pub username: Option<String>,
    /// Password.
    #[serde(default)]
    pub password: Option<String>,
    /// Whether to verify TLS certificates.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub validate_certs: Option<bool>,
}

impl std::fmt::Debug for InstanceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceProfile")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("validate_certs", &self.validate_certs)
            .finish()
    }
}

/// The parsed profile store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileStore {
    /// Name of the instance used when none is requested explicitly.
    #[serde(default)]
    pub default: Option<String>,
    /// Named instances.
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceProfile>,
}

impl ProfileStore {
    /// Parse a store from YAML text. Blank text is an empty store.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let store: ProfileStore = serde_yaml::from_str(text)?;
        Ok(store)
    }

    /// Load the store at `path`. A missing file yields `Ok(None)`.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Credentials file not found");
            return Ok(None);
        }

        let text = std::fs::read_to_string(path)?;
        let store = Self::from_yaml(&text).map_err(|e| {
            Error::new(ErrorKind::ProfileStore(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;

        tracing::debug!(
            path = %path.display(),
            instances = store.instances.len(),
            "Credentials file loaded"
        );
        Ok(Some(store))
    }

    /// Load the store from the default location.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load(default_profile_path()?)
    }

    /// Select the instance to use.
    ///
    /// An explicit name is used as given. Otherwise the declared default is
    /// used, and failing that the only instance when exactly one exists.
    pub fn select(&self, explicit: Option<&str>) -> Option<(&str, &InstanceProfile)> {
        if let Some(name) = explicit.filter(|n| !n.is_empty()) {
            let selected = self.instances.get_key_value(name);
            if selected.is_none() {
                tracing::warn!(instance = name, "Requested instance not found in credentials file");
            }
            return selected.map(|(k, v)| (k.as_str(), v));
        }

        if let Some(name) = self.default.as_deref() {
            if let Some((k, v)) = self.instances.get_key_value(name) {
                return Some((k.as_str(), v));
            }
        }

        if self.instances.len() == 1 {
            return self.instances.iter().next().map(|(k, v)| (k.as_str(), v));
        }

        None
    }
}

/// Get the default profile store path: `~/.config/smlm/credentials.yaml`.
pub fn default_profile_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::new(ErrorKind::Config("Could not find home directory".to_string())))?;

    Ok(home.join(".config").join("smlm").join("credentials.yaml"))
}

/// Accept YAML booleans as well as the usual yes/no/on/off spellings.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    let flag = Option::<Flag>::deserialize(deserializer)?;
    match flag {
        None => Ok(None),
        Some(Flag::Bool(b)) => Ok(Some(b)),
        Some(Flag::Int(i)) => Ok(Some(i != 0)),
        Some(Flag::Text(s)) => parse_flag(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid boolean value '{}'", s))),
    }
}

/// Parse a boolean flag spelled as text.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "y" => Some(true),
        "false" | "no" | "off" | "0" | "n" => Some(false),
        _ => None,
    }
}
