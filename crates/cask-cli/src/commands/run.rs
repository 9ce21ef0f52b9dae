//! `cask run` — create and run a container from an image.

use clap::Args;

use cask_common::config::RuntimePaths;
use cask_common::types::ResourceLimits;
use cask_runtime::{Engine, RunOptions};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Attach the container to the current terminal and wait for it.
    #[arg(short = 't', long, conflicts_with = "detach")]
    pub tty: bool,

    /// Run the container in the background.
    #[arg(short, long)]
    pub detach: bool,

    /// Container name (defaults to the generated id).
    #[arg(long)]
    pub name: Option<String>,

    /// Bind mount a host directory, host:container.
    #[arg(short, long)]
    pub volume: Option<String>,

    /// Memory limit written verbatim to the cgroup, e.g. 100m.
    #[arg(long = "mem")]
    pub memory: Option<String>,

    /// CPU shares weight.
    #[arg(long = "cpushare")]
    pub cpu_shares: Option<String>,

    /// CPU set, e.g. 0-1.
    #[arg(long = "cpuset")]
    pub cpuset: Option<String>,

    /// Environment entry KEY=VALUE for the container process (repeatable).
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,

    /// Network to attach the container to.
    #[arg(long = "net")]
    pub network: Option<String>,

    /// Publish a port, HOST:CONTAINER (repeatable).
    #[arg(short = 'p', long = "publish")]
    pub port_mappings: Vec<String>,

    /// Image name.
    pub image: String,

    /// Command to run inside the container.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if the container cannot be started.
pub fn execute(args: RunArgs, paths: RuntimePaths) -> anyhow::Result<()> {
    let options = RunOptions {
        tty: args.tty,
        detach: args.detach,
        name: args.name,
        volume: args.volume,
        env: args.env,
        network: args.network,
        port_mappings: args.port_mappings,
        limits: ResourceLimits {
            memory: args.memory,
            cpu_shares: args.cpu_shares,
            cpuset: args.cpuset,
        },
    };
    Engine::new(paths)
        .run(&args.image, &args.command, &options)
        .map_err(|e| anyhow::anyhow!("{e}"))
}
