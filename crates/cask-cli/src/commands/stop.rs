//! `cask stop` — stop a running container.

use clap::Args;

use cask_common::config::RuntimePaths;
use cask_runtime::Engine;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container name.
    pub name: String,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or the signal cannot be
/// delivered.
pub fn execute(args: StopArgs, paths: RuntimePaths) -> anyhow::Result<()> {
    Engine::new(paths)
        .stop(&args.name)
        .map_err(|e| anyhow::anyhow!("{e}"))
}
