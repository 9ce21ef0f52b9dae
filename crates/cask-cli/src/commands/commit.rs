//! `cask commit` — pack a container's filesystem into an image tarball.

use clap::Args;

use cask_common::config::RuntimePaths;
use cask_runtime::Engine;

/// Arguments for the `commit` command.
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Container name.
    pub name: String,

    /// Image name to write.
    pub image: String,
}

/// Executes the `commit` command.
///
/// # Errors
///
/// Returns an error if the container's filesystem cannot be packed.
pub fn execute(args: CommitArgs, paths: RuntimePaths) -> anyhow::Result<()> {
    let tar = Engine::new(paths)
        .commit(&args.name, &args.image)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{}", tar.display());
    Ok(())
}
