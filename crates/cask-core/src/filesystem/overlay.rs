//! Overlay mounts for layered container roots.
//!
//! One read-only lower (the image layer), one writable upper (the
//! container's write layer), and a work directory on the same filesystem
//! as the upper. Writes land only in the upper layer.

use std::path::Path;

use cask_common::error::{CaskError, Result};
use nix::mount::{mount, MsFlags};

/// Builds the overlay option string for the three layer roles.
#[must_use]
pub fn overlay_options(lower: &Path, upper: &Path, work: &Path) -> String {
    format!(
        "lowerdir={},upperdir={},workdir={}",
        lower.display(),
        upper.display(),
        work.display()
    )
}

/// Mounts an overlay of `lower` and `upper` at `merged`.
///
/// The upper, work, and merged directories are created if missing; the
/// lower directory must already hold the extracted image.
///
/// # Errors
///
/// Returns an error if directory creation or the mount syscall fails.
pub fn mount_overlay(lower: &Path, upper: &Path, work: &Path, merged: &Path) -> Result<()> {
    for dir in [upper, work, merged] {
        std::fs::create_dir_all(dir).map_err(|e| CaskError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    let opts = overlay_options(lower, upper, work);
    mount(
        Some("overlay"),
        merged,
        Some("overlay"),
        MsFlags::empty(),
        Some(opts.as_str()),
    )
    .map_err(|e| CaskError::Mount {
        message: format!("overlay mount at {} failed: {e}", merged.display()),
    })?;

    tracing::info!(merged = %merged.display(), "overlay mounted");
    Ok(())
}

/// Lazily detaches the overlay at `merged`.
///
/// # Errors
///
/// Returns an error if the unmount syscall fails.
pub fn unmount_overlay(merged: &Path) -> Result<()> {
    super::mount::unmount_detach(merged)?;
    tracing::info!(merged = %merged.display(), "overlay unmounted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn options_string_orders_the_three_roles() {
        let opts = overlay_options(
            Path::new("/var/lib/cask/images/busybox"),
            Path::new("/var/lib/cask/layers/web"),
            Path::new("/var/lib/cask/work/web"),
        );
        assert_eq!(
            opts,
            "lowerdir=/var/lib/cask/images/busybox,\
             upperdir=/var/lib/cask/layers/web,\
             workdir=/var/lib/cask/work/web"
        );
    }
}
