//! `cask exec` — run a command inside a running container.

use clap::Args;

use cask_common::config::RuntimePaths;
use cask_runtime::Engine;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container name.
    pub name: String,

    /// Command to run inside the container.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command and exits with the in-container command's
/// status.
///
/// # Errors
///
/// Returns an error if the container is missing, not running, or the
/// namespace re-entry cannot be started.
pub fn execute(args: ExecArgs, paths: RuntimePaths) -> anyhow::Result<()> {
    let code = Engine::new(paths)
        .exec(&args.name, &args.command)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    std::process::exit(code);
}
