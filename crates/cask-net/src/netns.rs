//! Scoped entry into another process's network namespace.

use std::fs::File;
use std::os::fd::AsFd;
use std::path::PathBuf;

use nix::sched::{setns, CloneFlags};
use tracing::error;

use cask_common::error::{CaskError, Result};

/// Opens the network namespace of `pid` as a file handle.
pub fn open_netns(pid: i32) -> Result<File> {
    let path = PathBuf::from(format!("/proc/{pid}/ns/net"));
    File::open(&path).map_err(|err| CaskError::Io { path, source: err })
}

/// Moves the calling thread into a target network namespace and restores
/// the original one on drop.
///
/// The guard holds the original namespace open for its whole lifetime, so
/// the restore cannot fail with a stale descriptor. Keep the guard alive
/// for exactly the region that must run inside the target namespace.
#[derive(Debug)]
pub struct NetnsGuard {
    original: File,
}

impl NetnsGuard {
    /// Enters the namespace behind `target`.
    pub fn enter(target: &File) -> Result<Self> {
        let path = PathBuf::from("/proc/self/ns/net");
        let original = File::open(&path).map_err(|err| CaskError::Io { path, source: err })?;
        setns(target.as_fd(), CloneFlags::CLONE_NEWNET).map_err(|err| CaskError::Network {
            message: format!("entering network namespace: {err}"),
        })?;
        Ok(Self { original })
    }
}

impl Drop for NetnsGuard {
    fn drop(&mut self) {
        if let Err(err) = setns(self.original.as_fd(), CloneFlags::CLONE_NEWNET) {
            error!(error = %err, "failed to restore the original network namespace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_netns_of_self() {
        let pid = std::process::id() as i32;
        assert!(open_netns(pid).is_ok());
    }

    #[test]
    fn open_netns_of_missing_process_fails() {
        // Pid 0 has no /proc entry.
        assert!(open_netns(0).is_err());
    }

    #[test]
    fn guard_enters_and_restores_own_namespace() {
        // Entering our own namespace is a no-op but exercises both setns
        // calls without needing root in a user namespace.
        let own = open_netns(std::process::id() as i32).unwrap();
        match NetnsGuard::enter(&own) {
            Ok(guard) => drop(guard),
            // setns needs CAP_SYS_ADMIN even for the current namespace.
            Err(err) => eprintln!("skipping guard_enters_and_restores_own_namespace: {err}"),
        }
    }
}
