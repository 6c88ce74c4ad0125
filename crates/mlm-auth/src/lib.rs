//! # mlm-auth
//!
//! Connection parameter resolution for the SUSE Multi-Linux Manager API.
//!
//! ## Security
//!
//! - The password is redacted in Debug output
//! - Tracing never records the password
//! - Error messages name missing fields, never their values
//!
//! ## Sources
//!
//! Every field is resolved independently from, in order of precedence:
//!
//! 1. **Explicit values** - passed by the caller
//! 2. **Environment** - `MLM_URL`, `MLM_USERNAME`, `MLM_PASSWORD`, `MLM_API_BASE_PATH`
//! 3. **Profile store** - `~/.config/smlm/credentials.yaml`
//!
//! ## Example
//!
//! ```rust,no_run
//! use mlm_auth::{CredentialResolver, ExplicitCredentials};
//!
//! # fn main() -> Result<(), mlm_auth::Error> {
//! let creds = CredentialResolver::new(ExplicitCredentials {
//!     instance: Some("production".to_string()),
//!     ..Default::default()
//! })
//! .resolve()?;
//!
//! println!("{}", creds.endpoint());
//! # Ok(())
//! # }
//! ```

mod credentials;
mod env;
mod error;
mod profile;

pub use credentials::{
    normalize_base_path, normalize_endpoint, CredentialResolver, CredentialTier, Credentials,
    ExplicitCredentials,
};
pub use env::{
    EnvSource, ProcessEnv, ENV_MLM_API_BASE_PATH, ENV_MLM_PASSWORD, ENV_MLM_URL,
    ENV_MLM_USERNAME,
};
pub use error::{Error, ErrorKind, Result};
pub use profile::{default_profile_path, parse_flag, InstanceProfile, ProfileStore};

/// Default API base path appended to the server URL.
pub const DEFAULT_API_BASE_PATH: &str = "/rhn/manager/api";
