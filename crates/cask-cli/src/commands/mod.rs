//! CLI command definitions and dispatch.

pub mod commit;
pub mod exec;
pub mod init;
pub mod logs;
pub mod network;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cask_common::config::RuntimePaths;

/// cask — daemon-less container runtime.
#[derive(Parser, Debug)]
#[command(name = "cask", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Override the runtime state root (for tests and scratch runs).
    #[arg(long, global = true, env = "CASK_ROOT")]
    pub root: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and run a container from an image.
    Run(run::RunArgs),
    /// Container init stage; never invoked by hand.
    #[command(hide = true)]
    Init(init::InitArgs),
    /// Run a command inside a running container.
    Exec(exec::ExecArgs),
    /// List containers.
    Ps(ps::PsArgs),
    /// Print a detached container's captured output.
    Logs(logs::LogsArgs),
    /// Stop a running container.
    Stop(stop::StopArgs),
    /// Remove a stopped container.
    Rm(rm::RmArgs),
    /// Pack a container's filesystem into an image tarball.
    Commit(commit::CommitArgs),
    /// Manage container networks.
    Network(network::NetworkArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let paths = cli
        .root
        .as_deref()
        .map_or_else(RuntimePaths::default, RuntimePaths::rooted);
    match cli.command {
        Command::Run(args) => run::execute(args, paths),
        Command::Init(args) => init::execute(args),
        Command::Exec(args) => exec::execute(args, paths),
        Command::Ps(args) => ps::execute(args, paths),
        Command::Logs(args) => logs::execute(args, paths),
        Command::Stop(args) => stop::execute(args, paths),
        Command::Rm(args) => rm::execute(args, paths),
        Command::Commit(args) => commit::execute(args, paths),
        Command::Network(args) => network::execute(args, paths),
    }
}
