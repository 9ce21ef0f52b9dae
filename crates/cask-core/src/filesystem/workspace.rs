//! Per-container workspace assembly and teardown.
//!
//! A workspace is the overlay of an image layer and a write layer mounted
//! at the container's merged path, plus an optional volume. Steps are
//! independently best-effort: a stale directory from an earlier run is a
//! common, harmless cause of failure, so each step logs and moves on.

use cask_common::config::RuntimePaths;
use cask_common::error::Result;

use super::{overlay, volume};

/// Builds the container root: image layer, write layer, overlay mount, and
/// optional volume.
pub fn create(paths: &RuntimePaths, volume_spec: Option<&str>, image: &str, name: &str) {
    if let Err(e) = ensure_image_layer(paths, image) {
        tracing::warn!(image, error = %e, "image layer preparation failed");
    }

    let write_layer = paths.write_layer(name);
    if let Err(e) = std::fs::create_dir_all(&write_layer) {
        tracing::warn!(path = %write_layer.display(), error = %e, "creating write layer failed");
    }

    if let Err(e) = overlay::mount_overlay(
        &paths.image_dir(image),
        &write_layer,
        &paths.work_dir(name),
        &paths.merged_dir(name),
    ) {
        tracing::warn!(container = name, error = %e, "mounting workspace failed");
    }

    if let Some(spec) = volume_spec {
        match volume::parse_spec(spec) {
            Some((host, container)) => {
                if let Err(e) = volume::mount_volume(&paths.merged_dir(name), &host, &container) {
                    tracing::warn!(spec, error = %e, "mounting volume failed");
                }
            }
            None => tracing::warn!(spec, "volume parameter is not correct, ignoring"),
        }
    }
}

/// Extracts the image tarball into its layer directory if absent.
///
/// An existing layer directory is reused as-is; it may be the lower layer
/// of a running container.
fn ensure_image_layer(paths: &RuntimePaths, image: &str) -> Result<()> {
    let layer = paths.image_dir(image);
    if layer.exists() {
        return Ok(());
    }
    cask_image::extract_archive(&paths.image_tar(image), &layer)
}

/// Tears the workspace down: volume, overlay mount, merged dir, write
/// layer, and work dir. The extracted image layer is a reusable cache and
/// is never deleted here.
pub fn remove(paths: &RuntimePaths, volume_spec: Option<&str>, name: &str) {
    if let Some(spec) = volume_spec {
        if let Some((_, container)) = volume::parse_spec(spec) {
            if let Err(e) = volume::umount_volume(&paths.merged_dir(name), &container) {
                tracing::warn!(spec, error = %e, "unmounting volume failed");
            }
        }
    }

    let merged = paths.merged_dir(name);
    if let Err(e) = overlay::unmount_overlay(&merged) {
        tracing::warn!(path = %merged.display(), error = %e, "unmounting workspace failed");
    }
    if let Err(e) = std::fs::remove_dir_all(&merged) {
        tracing::warn!(path = %merged.display(), error = %e, "removing merged dir failed");
    }

    for dir in [paths.write_layer(name), paths.work_dir(name)] {
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            tracing::warn!(path = %dir.display(), error = %e, "removing layer dir failed");
        }
    }
}
