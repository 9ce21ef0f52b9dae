//! `cask logs` — print a detached container's captured output.

use clap::Args;

use cask_common::config::RuntimePaths;
use cask_runtime::Engine;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container name.
    pub name: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the container or its log file does not exist.
pub fn execute(args: LogsArgs, paths: RuntimePaths) -> anyhow::Result<()> {
    let contents = Engine::new(paths)
        .logs(&args.name)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    print!("{contents}");
    Ok(())
}
