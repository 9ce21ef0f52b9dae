//! Root filesystem switching via `pivot_root(2)`.

use std::path::{Path, PathBuf};

use cask_common::constants::PIVOT_OLD_ROOT;
use cask_common::error::{CaskError, Result};
use nix::mount::MntFlags;

use super::mount;

/// Creates the hidden directory that will briefly hold the old root.
///
/// # Errors
///
/// Returns an error if the directory cannot be created, including when the
/// path is already occupied by a file.
pub fn prepare_old_root(root: &Path) -> Result<PathBuf> {
    let old_root = root.join(PIVOT_OLD_ROOT);
    std::fs::create_dir(&old_root).map_err(|e| CaskError::Io {
        path: old_root.clone(),
        source: e,
    })?;
    Ok(old_root)
}

/// Makes `root` the root of the mount namespace.
///
/// `pivot_root` requires the new root to be a mountpoint on a different
/// filesystem than the old root, so `root` is first bind-mounted onto
/// itself. The old root is parked in a hidden directory, lazily detached,
/// and removed.
///
/// # Errors
///
/// Returns an error if any step fails; the caller must treat that as fatal
/// and never reach exec.
pub fn switch_root(root: &Path) -> Result<()> {
    mount::bind_mount(root, root, true)?;

    let _ = prepare_old_root(root)?;

    nix::unistd::pivot_root(root, &root.join(PIVOT_OLD_ROOT)).map_err(|e| CaskError::Mount {
        message: format!("pivot_root into {} failed: {e}", root.display()),
    })?;

    nix::unistd::chdir("/").map_err(|e| CaskError::Mount {
        message: format!("chdir / after pivot failed: {e}"),
    })?;

    let parked = Path::new("/").join(PIVOT_OLD_ROOT);
    nix::mount::umount2(&parked, MntFlags::MNT_DETACH).map_err(|e| CaskError::Mount {
        message: format!("detach old root failed: {e}"),
    })?;

    std::fs::remove_dir(&parked).map_err(|e| CaskError::Io {
        path: parked,
        source: e,
    })
}
