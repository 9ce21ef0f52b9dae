//! `cask rm` — remove a stopped container.

use clap::Args;

use cask_common::config::RuntimePaths;
use cask_runtime::Engine;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container name.
    pub name: String,
}

/// Executes the `rm` command, tearing down what a detached run left
/// behind.
///
/// # Errors
///
/// Returns an error if the container is unknown or still running.
pub fn execute(args: RmArgs, paths: RuntimePaths) -> anyhow::Result<()> {
    Engine::new(paths)
        .remove(&args.name)
        .map_err(|e| anyhow::anyhow!("{e}"))
}
