//! `cask ps` — list containers.

use clap::Args;

use cask_common::config::RuntimePaths;
use cask_runtime::Engine;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {}

/// Executes the `ps` command, printing every known container record in a
/// tabular format.
///
/// # Errors
///
/// Returns an error if the records cannot be listed.
pub fn execute(_args: PsArgs, paths: RuntimePaths) -> anyhow::Result<()> {
    let records = Engine::new(paths).list().map_err(|e| anyhow::anyhow!("{e}"))?;

    if records.is_empty() {
        println!("No containers found.");
        return Ok(());
    }

    println!(
        "{:<12} {:<16} {:<8} {:<8} {:<24} {:<25}",
        "ID", "NAME", "PID", "STATUS", "COMMAND", "CREATED"
    );
    for record in &records {
        println!(
            "{:<12} {:<16} {:<8} {:<8} {:<24} {:<25}",
            record.id, record.name, record.pid, record.status, record.command, record.created_at
        );
    }
    Ok(())
}
