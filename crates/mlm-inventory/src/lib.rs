//! # mlm-inventory
//!
//! Ansible dynamic inventory for SUSE Multi-Linux Manager.
//!
//! Systems are fetched with their derived patch status and group
//! membership, filtered, and turned into the JSON document Ansible expects
//! from `--list` and `--host`. Options can add composed host variables
//! and cache the filtered system list on disk between runs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mlm_client::{ConfigOverrides, MlmClient};
//! use mlm_inventory::{Inventory, InventoryOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = MlmClient::new(ConfigOverrides::new().with_instance("production"))?;
//!     let inventory = Inventory::collect(&mut client, &InventoryOptions::default())?;
//!     println!("{}", inventory.to_json());
//!     Ok(())
//! }
//! ```

mod cache;
mod compose;
mod error;
mod filter;
mod inventory;

pub use cache::SystemCache;
pub use compose::Expression;
pub use error::{Error, ErrorKind, Result};
pub use filter::{InventoryFilters, PatchStatusFilter, StatusFilter};
pub use inventory::{
    Inventory, InventoryOptions, ALL_SYSTEMS_GROUP, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_TIMEOUT,
    GROUP_BY_PATCH_STATUS,
};
