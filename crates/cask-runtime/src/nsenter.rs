//! Namespace re-entry for `cask exec`.
//!
//! `exec` re-executes the current binary with two trigger variables set.
//! The fresh process checks for them before any argument parsing, enters
//! the target container's namespaces and runs the requested command there.
//! The indirection exists because a multi-threaded process cannot join a
//! PID namespace itself; only its children land in it.

use std::fs::File;
use std::os::fd::AsFd;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use nix::sched::{setns, CloneFlags};
use tracing::{debug, warn};

use cask_common::constants::{ENV_EXEC_CMD, ENV_EXEC_PID};
use cask_common::error::{CaskError, Result};

/// Namespaces entered for an exec, in order.
const NAMESPACES: [&str; 5] = ["ipc", "uts", "net", "pid", "mnt"];

/// Returns the pending exec request when both trigger variables are set.
#[must_use]
pub fn pending() -> Option<(String, String)> {
    let pid = std::env::var(ENV_EXEC_PID).ok()?;
    let command = std::env::var(ENV_EXEC_CMD).ok()?;
    Some((pid, command))
}

/// Enters the namespaces of `pid` and runs `command` through the shell,
/// returning its exit status.
///
/// Namespaces are entered independently: one failing is logged and the
/// rest are still attempted, so a partially set up container stays
/// reachable for debugging.
pub fn run(pid: &str, command: &str) -> Result<i32> {
    for namespace in NAMESPACES {
        if let Err(err) = enter(pid, namespace) {
            warn!(namespace, pid, error = %err, "failed to enter namespace");
        }
    }
    let status = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .status()
        .map_err(|err| CaskError::Process {
            message: format!("running {command:?}: {err}"),
        })?;
    debug!(pid, command, code = ?status.code(), "exec command finished");
    Ok(exit_code(status))
}

fn enter(pid: &str, namespace: &str) -> Result<()> {
    let path = PathBuf::from(format!("/proc/{pid}/ns/{namespace}"));
    let file = File::open(&path).map_err(|err| CaskError::Io {
        path: path.clone(),
        source: err,
    })?;
    setns(file.as_fd(), CloneFlags::empty()).map_err(|err| CaskError::Process {
        message: format!("setns {}: {err}", path.display()),
    })
}

/// Exit code of a finished process, mapping signal deaths to the shell's
/// 128+signal convention.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    #[allow(unsafe_code)]
    fn pending_requires_both_variables() {
        unsafe {
            std::env::remove_var(ENV_EXEC_PID);
            std::env::remove_var(ENV_EXEC_CMD);
        }
        assert!(pending().is_none());

        unsafe { std::env::set_var(ENV_EXEC_PID, "42") };
        assert!(pending().is_none());

        unsafe { std::env::set_var(ENV_EXEC_CMD, "ls /") };
        assert_eq!(pending(), Some(("42".to_string(), "ls /".to_string())));

        unsafe {
            std::env::remove_var(ENV_EXEC_PID);
            std::env::remove_var(ENV_EXEC_CMD);
        }
    }

    #[test]
    fn exit_code_decodes_wait_status() {
        // Exit code lives in bits 8..16 of a wait status.
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(7 << 8)), 7);
        // Raw signal number means killed by that signal.
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
    }

    #[test]
    fn run_propagates_the_command_exit_status() {
        // Entering our own namespaces fails without privileges and is
        // logged; the command still runs.
        let pid = std::process::id().to_string();
        assert_eq!(run(&pid, "exit 7").unwrap(), 7);
        assert_eq!(run(&pid, "true").unwrap(), 0);
    }
}
