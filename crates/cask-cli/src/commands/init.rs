//! `cask init` — the hidden in-container init stage.
//!
//! Spawned by `run` via `/proc/self/exe init` inside the fresh namespaces;
//! reads its command from the inherited pipe, switches the rootfs, and
//! execs the container workload.

use clap::Args;

/// Arguments for the hidden `init` stage (none).
#[derive(Args, Debug)]
pub struct InitArgs {}

/// Executes the init stage. Only returns on failure.
///
/// # Errors
///
/// Returns an error if any step before the final exec fails.
pub fn execute(_args: InitArgs) -> anyhow::Result<()> {
    cask_runtime::init::run().map_err(|e| anyhow::anyhow!("{e}"))
}
