//! Adapter for the environment embedding the client: task runners, CLIs,
//! configuration management modules.

use std::collections::BTreeMap;
use std::time::Duration;

use mlm_auth::parse_flag;
use tracing::error;

use crate::client::MlmClient;
use crate::config::ConfigOverrides;
use crate::error::{Error, ErrorKind, Result};
use crate::mapping::FieldMappings;

/// What the client needs from its host.
pub trait Host {
    /// Look up a parameter by name. Empty values count as absent.
    fn param(&self, name: &str) -> Option<String>;

    /// Report a failure to the user.
    fn fail(&self, message: &str);
}

impl ConfigOverrides {
    /// Read overrides from host parameters: `url`, `username`, `password`,
    /// `instance`, `validate_certs`, `timeout` (seconds), `retries` and
    /// `api_base_path`.
    ///
    /// `api_endpoints` (endpoint name to path) and `field_mappings` (entity
    /// to field table) are JSON objects.
    pub fn from_host<H: Host + ?Sized>(host: &H) -> Result<Self> {
        let param = |name: &str| host.param(name).filter(|v| !v.is_empty());

        let mut overrides = ConfigOverrides::new();
        if let Some(url) = param("url") {
            overrides = overrides.with_url(url);
        }
        if let Some(username) = param("username") {
            overrides = overrides.with_username(username);
        }
        if let Some(password) = param("password") {
            overrides = overrides.with_password(password);
        }
        if let Some(instance) = param("instance") {
            overrides = overrides.with_instance(instance);
        }
        if let Some(base_path) = param("api_base_path") {
            overrides = overrides.with_api_base_path(base_path);
        }
        if let Some(flag) = param("validate_certs") {
            let validate = parse_flag(&flag).ok_or_else(|| invalid("validate_certs", &flag))?;
            overrides = overrides.with_validate_certs(validate);
        }
        if let Some(timeout) = param("timeout") {
            let secs: u64 = timeout
                .trim()
                .parse()
                .map_err(|_| invalid("timeout", &timeout))?;
            overrides = overrides.with_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = param("retries") {
            let retries: u32 = retries
                .trim()
                .parse()
                .map_err(|_| invalid("retries", &retries))?;
            overrides = overrides.with_max_retries(retries);
        }
        if let Some(raw) = param("api_endpoints") {
            let endpoints: BTreeMap<String, String> =
                serde_json::from_str(&raw).map_err(|e| malformed("api_endpoints", e))?;
            for (name, path) in endpoints {
                overrides = overrides.with_endpoint(name, path);
            }
        }
        if let Some(raw) = param("field_mappings") {
            let mappings: FieldMappings =
                serde_json::from_str(&raw).map_err(|e| malformed("field_mappings", e))?;
            overrides = overrides.with_field_mappings(mappings);
        }

        Ok(overrides)
    }
}

fn invalid(parameter: &str, value: &str) -> Error {
    Error::new(ErrorKind::Configuration(format!(
        "invalid value '{}' for {}",
        value, parameter
    )))
    .with_parameter(parameter)
}

fn malformed(parameter: &str, err: serde_json::Error) -> Error {
    Error::with_source(
        ErrorKind::Configuration(format!("{} must be a JSON object: {}", parameter, err)),
        err,
    )
    .with_parameter(parameter)
}

/// Build a client from host parameters, log in, run `op` and log out.
///
/// Any failure is reported through [`Host::fail`] and returned.
pub fn run_with_session<H, T, F>(host: &H, op: F) -> Result<T>
where
    H: Host + ?Sized,
    F: FnOnce(&mut MlmClient) -> Result<T>,
{
    let result = ConfigOverrides::from_host(host)
        .and_then(MlmClient::new)
        .and_then(|mut client| client.with_session(op));

    if let Err(e) = &result {
        error!(error = %e, "MLM operation failed");
        host.fail(&e.to_string());
    }
    result
}
