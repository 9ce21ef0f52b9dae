//! Parent-side process isolation.
//!
//! `spawn_init` clones the init child into fresh UTS/PID/mount/net/IPC
//! namespaces. The child re-executes the current binary as `cask init`
//! with the read end of a command pipe on a fixed descriptor; the parent
//! keeps the write end and releases the container's command line through
//! it once cgroups, record, and networking are in place.

// clone(2) and descriptor juggling in the child need libc.
#![allow(unsafe_code)]

use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::Write;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::Path;

use nix::fcntl::OFlag;
use nix::sched::{clone, CloneFlags};
use nix::unistd::{chdir, dup2_stderr, dup2_stdout, execve, pipe2, Pid};

use cask_common::constants::INIT_PIPE_FD;
use cask_common::error::{CaskError, Result};

const STACK_SIZE: usize = 1024 * 1024;

/// Write end of the command pipe, handed back by [`spawn_init`].
#[derive(Debug)]
pub struct CommandSender {
    pipe: OwnedFd,
}

impl CommandSender {
    /// Writes the space-joined command line and closes the pipe. The close
    /// is the go signal: init reads the pipe to EOF before it starts.
    pub fn send(self, command: &[String]) -> Result<()> {
        let line = command.join(" ");
        let mut file = File::from(self.pipe);
        file.write_all(line.as_bytes())
            .map_err(|err| CaskError::Process {
                message: format!("sending command to init: {err}"),
            })
    }
}

/// Clones the init child for a container.
///
/// The child starts in new namespaces with cwd set to `merged_root`, the
/// command pipe on its fixed descriptor, and the parent environment plus
/// `extra_env` (`KEY=VALUE` entries). When `log_file` is given the child's
/// stdout and stderr are redirected into it before exec; otherwise the
/// child inherits the parent's stdio. Everything the child touches after
/// the clone is prepared up front.
pub fn spawn_init(
    merged_root: &Path,
    extra_env: &[String],
    log_file: Option<&File>,
) -> Result<(Pid, CommandSender)> {
    let (read, write) = pipe2(OFlag::O_CLOEXEC).map_err(|err| CaskError::Process {
        message: format!("creating command pipe: {err}"),
    })?;

    let exe = cstring("/proc/self/exe")?;
    let args = [exe.clone(), cstring("init")?];
    let env = build_env(extra_env)?;

    let flags = CloneFlags::CLONE_NEWUTS
        | CloneFlags::CLONE_NEWPID
        | CloneFlags::CLONE_NEWNS
        | CloneFlags::CLONE_NEWNET
        | CloneFlags::CLONE_NEWIPC;
    let mut stack = vec![0u8; STACK_SIZE];
    let pid = unsafe {
        clone(
            Box::new(|| child_entry(&read, log_file, merged_root, &exe, &args, &env)),
            &mut stack,
            flags,
            Some(libc::SIGCHLD),
        )
    }
    .map_err(|err| CaskError::Process {
        message: format!("cloning init process: {err}"),
    })?;

    drop(read);
    Ok((pid, CommandSender { pipe: write }))
}

/// Runs in the child between clone and exec. Only returns on failure; the
/// return value becomes the child's exit status.
fn child_entry(
    pipe: &OwnedFd,
    log_file: Option<&File>,
    merged_root: &Path,
    exe: &CStr,
    args: &[CString],
    env: &[CString],
) -> isize {
    if let Some(log) = log_file {
        if dup2_stdout(log).is_err() || dup2_stderr(log).is_err() {
            return 127;
        }
    }
    // dup2 clears close-on-exec on the new descriptor, so the pipe
    // survives the exec below while the original ends do not.
    if unsafe { libc::dup2(pipe.as_raw_fd(), INIT_PIPE_FD) } < 0 {
        return 127;
    }
    if chdir(merged_root).is_err() {
        return 127;
    }
    let _ = execve(exe, args, env);
    127
}

/// Parent environment plus the user-supplied `KEY=VALUE` entries, as the
/// C strings execve wants.
fn build_env(extra: &[String]) -> Result<Vec<CString>> {
    let mut env = Vec::new();
    for (key, value) in std::env::vars() {
        env.push(cstring(&format!("{key}={value}"))?);
    }
    for entry in extra {
        env.push(cstring(entry)?);
    }
    Ok(env)
}

fn cstring(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| CaskError::Process {
        message: format!("{value:?} contains a nul byte"),
    })
}
