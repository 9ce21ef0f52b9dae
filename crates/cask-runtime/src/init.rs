//! The in-container init stage, entered as the hidden `cask init`
//! subcommand right after the clone.
//!
//! Init blocks on the command pipe first: EOF doubles as the parent's go
//! signal, so cgroup limits and network wiring are in place before the
//! rootfs switch and exec happen.

// The command pipe arrives as a raw inherited descriptor.
#![allow(unsafe_code)]

use std::ffi::CString;
use std::fs::File;
use std::io::Read;
use std::os::fd::FromRawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nix::unistd::execv;
use tracing::info;

use cask_common::constants::INIT_PIPE_FD;
use cask_common::error::{CaskError, Result};
use cask_core::filesystem::{mount, pivot_root};

/// Runs the init stage to its exec. Only returns on failure.
pub fn run() -> Result<()> {
    let command = read_command()?;
    info!(command = %command.join(" "), "init received command");
    setup_rootfs()?;
    let program = resolve_program(&command[0])?;
    exec(&program, &command)
}

/// Reads the command line from the inherited pipe, blocking until the
/// parent closes its end.
fn read_command() -> Result<Vec<String>> {
    let mut pipe = unsafe { File::from_raw_fd(INIT_PIPE_FD) };
    let mut line = String::new();
    pipe.read_to_string(&mut line)
        .map_err(|err| CaskError::Process {
            message: format!("reading command pipe: {err}"),
        })?;
    parse_command(&line)
}

fn parse_command(line: &str) -> Result<Vec<String>> {
    let command: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    if command.is_empty() {
        return Err(CaskError::Process {
            message: "no command received on the init pipe".to_string(),
        });
    }
    Ok(command)
}

/// Swaps the container into its own root: mounts become private, the cwd
/// (the merged overlay) becomes `/` via pivot_root, then fresh `proc` and
/// `/dev` are mounted inside.
fn setup_rootfs() -> Result<()> {
    let root = std::env::current_dir().map_err(|err| CaskError::Process {
        message: format!("resolving container root: {err}"),
    })?;
    mount::make_mount_private()?;
    pivot_root::switch_root(&root)?;
    mount::mount_proc()?;
    mount::mount_dev()?;
    Ok(())
}

/// PATH lookup for the container command, inside the new root.
fn resolve_program(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|err| CaskError::Process {
        message: format!("command {name} not found: {err}"),
    })
}

fn exec(program: &Path, command: &[String]) -> Result<()> {
    let program_c =
        CString::new(program.as_os_str().as_bytes()).map_err(|_| CaskError::Process {
            message: format!("{} contains a nul byte", program.display()),
        })?;
    let args: Vec<CString> = command
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| CaskError::Process {
            message: "command contains a nul byte".to_string(),
        })?;
    match execv(&program_c, &args) {
        Ok(never) => match never {},
        Err(err) => Err(CaskError::Process {
            message: format!("exec {}: {err}", program.display()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_splits_on_whitespace() {
        assert_eq!(
            parse_command("sh -c  echo\thi\n").unwrap(),
            vec!["sh", "-c", "echo", "hi"]
        );
    }

    #[test]
    fn parse_command_rejects_empty_input() {
        assert!(parse_command("").is_err());
        assert!(parse_command("  \n\t ").is_err());
    }

    #[test]
    fn resolve_program_finds_sh() {
        assert!(resolve_program("sh").is_ok());
    }

    #[test]
    fn resolve_program_reports_missing_commands() {
        let err = resolve_program("cask-no-such-binary").unwrap_err();
        assert!(matches!(err, CaskError::Process { .. }));
    }
}
