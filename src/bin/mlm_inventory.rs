//! Ansible dynamic inventory script for SUSE Multi-Linux Manager.
//!
//! Connection parameters come from the `MLM_*` environment variables and the
//! credentials file; `--instance` picks a named entry from that file.
//!
//! ```sh
//! export MLM_URL=https://mlm.example.com MLM_USERNAME=admin MLM_PASSWORD=...
//! ansible-inventory -i mlm-inventory --graph
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mlm_api::{ConfigOverrides, Inventory, InventoryOptions, MlmClient};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mlm-inventory", version, about = "Ansible dynamic inventory for SUSE Multi-Linux Manager")]
struct Cli {
    /// Print the whole inventory.
    #[arg(long, conflicts_with = "host", required_unless_present = "host")]
    list: bool,

    /// Print the variables of one host.
    #[arg(long, value_name = "NAME")]
    host: Option<String>,

    /// Instance name in the credentials file.
    #[arg(long, value_name = "NAME")]
    instance: Option<String>,

    /// YAML file with `filters` and `group_by`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("mlm-inventory: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let options = match &cli.config {
        Some(path) => InventoryOptions::from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => InventoryOptions::default(),
    };

    let mut overrides = ConfigOverrides::new();
    if let Some(instance) = &cli.instance {
        overrides = overrides.with_instance(instance.clone());
    }

    let mut client = MlmClient::new(overrides)?;
    let inventory = Inventory::collect(&mut client, &options)?;

    let output = match &cli.host {
        Some(host) => inventory.host_json(host)?,
        None => inventory.to_json(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
