//! # cask — container runtime CLI
//!
//! Daemon-less container runtime for Linux: namespaces, cgroups v1,
//! overlay rootfs, bridge networking. Single binary; the same executable
//! re-runs itself for the container init stage and for namespace entry.

mod commands;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // A pending exec request means this process was re-executed purely to
    // enter a container's namespaces; it is handled before argument
    // parsing so the request can never be mistaken for a normal run.
    if let Some((pid, command)) = cask_runtime::nsenter::pending() {
        let code = cask_runtime::nsenter::run(&pid, &command)?;
        std::process::exit(code);
    }

    let cli = Cli::parse();
    commands::execute(cli)
}
