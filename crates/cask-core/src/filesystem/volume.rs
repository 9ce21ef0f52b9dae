//! Host-directory volumes bound into container roots.

use std::path::{Path, PathBuf};

use cask_common::error::Result;

use super::mount;

/// Parses a `hostPath:containerPath` volume spec.
///
/// Exactly two non-empty colon-separated segments are required; anything
/// else is rejected so the caller can warn and ignore the spec.
#[must_use]
pub fn parse_spec(spec: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = spec.split(':').collect();
    match parts.as_slice() {
        [host, container] if !host.is_empty() && !container.is_empty() => {
            Some(((*host).to_string(), (*container).to_string()))
        }
        _ => None,
    }
}

/// Resolves the in-container mount point under the merged root.
///
/// The container path is usually absolute; joining it verbatim would
/// replace the base, so the leading separator is stripped first.
#[must_use]
pub fn volume_target(merged: &Path, container_path: &str) -> PathBuf {
    merged.join(container_path.trim_start_matches('/'))
}

/// Bind-mounts the host directory into the merged root.
///
/// Both the host directory and the in-container mount point are created if
/// missing; creation failures are logged and the mount is still attempted.
///
/// # Errors
///
/// Returns an error if the bind mount itself fails.
pub fn mount_volume(merged: &Path, host_path: &str, container_path: &str) -> Result<()> {
    let host = Path::new(host_path);
    if let Err(e) = std::fs::create_dir_all(host) {
        tracing::warn!(path = host_path, error = %e, "creating host volume dir failed");
    }

    let target = volume_target(merged, container_path);
    if let Err(e) = std::fs::create_dir_all(&target) {
        tracing::warn!(path = %target.display(), error = %e, "creating volume mount point failed");
    }

    mount::bind_mount(host, &target, false)?;
    tracing::info!(host = host_path, target = %target.display(), "volume mounted");
    Ok(())
}

/// Unmounts a volume from the merged root.
///
/// # Errors
///
/// Returns an error if the unmount syscall fails.
pub fn umount_volume(merged: &Path, container_path: &str) -> Result<()> {
    let target = volume_target(merged, container_path);
    mount::unmount_detach(&target)?;
    tracing::info!(target = %target.display(), "volume unmounted");
    Ok(())
}
