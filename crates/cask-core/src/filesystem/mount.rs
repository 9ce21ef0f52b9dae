//! Thin wrappers over `mount(2)` and `umount2(2)` for the mounts the
//! runtime performs outside of overlay handling.

use std::path::Path;

use cask_common::error::{CaskError, Result};
use nix::mount::{mount, umount2, MntFlags, MsFlags};

/// Remounts `/` as private recursively.
///
/// Newer kernels default to shared mount propagation, which would leak the
/// container's mounts back into the host namespace.
///
/// # Errors
///
/// Returns an error if the remount syscall fails.
pub fn make_mount_private() -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_PRIVATE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| CaskError::Mount {
        message: format!("remount / private failed: {e}"),
    })
}

/// Mounts a fresh procfs at `/proc` with hardened flags.
///
/// # Errors
///
/// Returns an error if the mount syscall fails.
pub fn mount_proc() -> Result<()> {
    mount(
        Some("proc"),
        "/proc",
        Some("proc"),
        MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
        None::<&str>,
    )
    .map_err(|e| CaskError::Mount {
        message: format!("mount proc failed: {e}"),
    })
}

/// Mounts a tmpfs at `/dev` so the container has a writable device dir.
///
/// # Errors
///
/// Returns an error if the mount syscall fails.
pub fn mount_dev() -> Result<()> {
    mount(
        Some("tmpfs"),
        "/dev",
        Some("tmpfs"),
        MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME,
        Some("mode=755"),
    )
    .map_err(|e| CaskError::Mount {
        message: format!("mount /dev tmpfs failed: {e}"),
    })
}

/// Bind-mounts `source` onto `target`.
///
/// # Errors
///
/// Returns an error if the mount syscall fails.
pub fn bind_mount(source: &Path, target: &Path, recursive: bool) -> Result<()> {
    let mut flags = MsFlags::MS_BIND;
    if recursive {
        flags |= MsFlags::MS_REC;
    }
    mount(
        Some(source),
        target,
        Some("bind"),
        flags,
        None::<&str>,
    )
    .map_err(|e| CaskError::Mount {
        message: format!(
            "bind mount {} -> {} failed: {e}",
            source.display(),
            target.display()
        ),
    })
}

/// Lazily detaches the mount at `target`.
///
/// # Errors
///
/// Returns an error if the unmount syscall fails.
pub fn unmount_detach(target: &Path) -> Result<()> {
    umount2(target, MntFlags::MNT_DETACH).map_err(|e| CaskError::Mount {
        message: format!("unmount {} failed: {e}", target.display()),
    })
}
