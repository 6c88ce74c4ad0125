//! # mlm-api
//!
//! A SUSE Multi-Linux Manager API client library for Rust.
//!
//! It resolves connection parameters, manages the login session, retries
//! transient failures and normalizes the server's response envelopes.
//!
//! ## Security
//!
//! - The password and session cookie are redacted in Debug output
//! - Tracing spans never record the password or the session cookie
//! - Quoted error bodies are sanitized before they reach an error message
//!
//! ## Crates
//!
//! - **mlm-auth** - Connection parameters: explicit values, environment, credentials profile store
//! - **mlm-client** - Session, request retry, response normalization, pagination, field mapping
//! - **mlm-inventory** - Ansible dynamic inventory built from managed systems
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mlm_api::{ConfigOverrides, MlmClient};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // url/username/password fall back to MLM_* variables and ~/.config/smlm/credentials.yaml
//!     let mut client = MlmClient::new(ConfigOverrides::new().with_instance("production"))?;
//!
//!     let systems = client.with_session(|c| c.systems_with_patch_status())?;
//!     for system in systems {
//!         println!("{} {}", system["name"], system["patch_status"]);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Re-export all crates for convenient access
#[cfg(feature = "auth")]
pub use mlm_auth as auth;
#[cfg(feature = "client")]
pub use mlm_client as client;
#[cfg(feature = "inventory")]
pub use mlm_inventory as inventory;

// Re-export commonly used types at the top level
#[cfg(feature = "auth")]
pub use mlm_auth::{CredentialResolver, Credentials};
#[cfg(feature = "client")]
pub use mlm_client::{
    run_with_session, ConfigOverrides, ConnectionConfig, Error, ErrorKind, Host, MlmClient,
    Result,
};
#[cfg(feature = "inventory")]
pub use mlm_inventory::{Inventory, InventoryFilters, InventoryOptions};
