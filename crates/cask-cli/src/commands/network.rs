//! `cask network` — manage container networks.

use clap::{Args, Subcommand};
use ipnetwork::Ipv4Network;

use cask_common::config::RuntimePaths;
use cask_net::bridge::DRIVER_NAME;
use cask_net::NetworkManager;

/// Arguments for the `network` command group.
#[derive(Args, Debug)]
pub struct NetworkArgs {
    /// Network subcommand to execute.
    #[command(subcommand)]
    pub command: NetworkCommand,
}

/// Network subcommands.
#[derive(Subcommand, Debug)]
pub enum NetworkCommand {
    /// Create a network.
    Create(CreateArgs),
    /// Remove a network.
    Rm(NetworkRmArgs),
    /// List networks.
    Ls,
}

/// Arguments for `network create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Network driver.
    #[arg(long, default_value = DRIVER_NAME)]
    pub driver: String,

    /// Subnet in CIDR form, e.g. 192.168.10.0/24.
    #[arg(long)]
    pub subnet: Ipv4Network,

    /// Network name.
    pub name: String,
}

/// Arguments for `network rm`.
#[derive(Args, Debug)]
pub struct NetworkRmArgs {
    /// Network name.
    pub name: String,
}

/// Executes a `network` subcommand.
///
/// # Errors
///
/// Returns an error if the network operation fails.
pub fn execute(args: NetworkArgs, paths: RuntimePaths) -> anyhow::Result<()> {
    let mut manager = NetworkManager::new(&paths).map_err(|e| anyhow::anyhow!("{e}"))?;
    match args.command {
        NetworkCommand::Create(create) => {
            let network = manager
                .create(&create.driver, create.subnet, &create.name)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("{} ({})", network.name, network.ip_range);
            Ok(())
        }
        NetworkCommand::Rm(rm) => manager.delete(&rm.name).map_err(|e| anyhow::anyhow!("{e}")),
        NetworkCommand::Ls => {
            let networks = manager.list();
            println!("{:<16} {:<20} {:<8}", "NAME", "IP RANGE", "DRIVER");
            for network in networks {
                let ip_range = network.ip_range.to_string();
                println!("{:<16} {ip_range:<20} {:<8}", network.name, network.driver);
            }
            Ok(())
        }
    }
}
