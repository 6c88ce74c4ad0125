//! Environment variable lookup.

use std::collections::HashMap;

/// Environment variable holding the server URL.
pub const ENV_MLM_URL: &str = "MLM_URL";
/// Environment variable holding the login name.
pub const ENV_MLM_USERNAME: &str = "MLM_USERNAME";
/// Environment variable holding the password.
pub const ENV_MLM_PASSWORD: &str = "MLM_PASSWORD";
/// Environment variable holding the API base path.
pub const ENV_MLM_API_BASE_PATH: &str = "MLM_API_BASE_PATH";

/// Source of environment variables for the second resolution tier.
pub trait EnvSource {
    /// Look up a variable. Empty values are reported as absent.
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.is_empty()).cloned()
    }
}
