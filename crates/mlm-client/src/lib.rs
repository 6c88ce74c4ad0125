//! # mlm-client
//!
//! Blocking client for the SUSE Multi-Linux Manager JSON API.
//!
//! - Session login/logout with cookie handling
//! - Automatic retry with capped exponential backoff and jitter
//! - Envelope unwrapping and in-body failure detection
//! - Page-number pagination
//! - Declarative field mapping for heterogeneous server records
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        MlmClient                            │
//! │  - Holds ConnectionConfig + Session                         │
//! │  - get/post/put/delete, pagination, systems queries         │
//! │  - Normalizes responses (envelope, in-body errors, shape)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    RequestExecutor                          │
//! │  - Retries 429, 5xx and transport failures                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Transport                             │
//! │  - ReqwestTransport (blocking), or a test double            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use mlm_client::{ConfigOverrides, MlmClient};
//!
//! fn main() -> Result<(), mlm_client::Error> {
//!     let mut client = MlmClient::new(
//!         ConfigOverrides::new()
//!             .with_url("https://mlm.example.com")
//!             .with_username("admin")
//!             .with_password("secret"),
//!     )?;
//!
//!     client.login()?;
//!     let orgs = client.get("/org/listOrgs")?.into_records();
//!     println!("{} organizations", orgs.len());
//!     client.logout();
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod endpoints;
mod error;
mod executor;
mod host;
mod mapping;
mod pagination;
mod request;
mod response;
mod retry;
mod session;
mod systems;
mod transport;

#[cfg(any(test, feature = "test-util"))]
mod scripted;
#[cfg(test)]
mod testing;

pub use client::{MlmClient, ALREADY_EXISTS_CODES};
pub use config::{
    ConfigOverrides, ConnectionConfig, DEFAULT_IDEMPOTENT_CREATE_PATHS, DEFAULT_TIMEOUT,
};
pub use endpoints::EndpointTable;
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use executor::{RequestExecutor, RequestOutcome};
pub use host::{run_with_session, Host};
pub use mapping::{apply, FieldMappingTable, FieldMappings, FieldRule, SYSTEM_ENTITY};
pub use pagination::{Pagination, DEFAULT_PAGE_SIZE};
pub use request::{append_query, ApiCall, RequestBuilder, RequestMethod};
pub use response::{normalize, normalize_value, sanitize_error_message, NormalizedResponse, Shape};
pub use retry::{RetryConfig, RetryPolicy, DEFAULT_MAX_DELAY_UNITS, DEFAULT_MAX_RETRIES};
pub use session::Session;
pub use systems::PatchStatus;
pub use transport::{HttpResponse, ReqwestTransport, Transport, TransportFailure};

#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedTransport;

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("mlm-api/", env!("CARGO_PKG_VERSION"));
