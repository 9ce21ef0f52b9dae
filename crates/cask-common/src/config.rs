//! Runtime path layout for the cask runtime.
//!
//! Every component receives a [`RuntimePaths`] value instead of reaching for
//! hard-coded globals, so tests can point the whole runtime at a temporary
//! directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;

/// Filesystem layout of all state the runtime reads and writes.
///
/// Two roots: `run_dir` holds per-container records, logs, and network
/// state; `data_dir` holds image tarballs, extracted image layers, write
/// layers, overlay work directories, and merged mountpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePaths {
    /// Runtime state root, `/var/run/cask` by default.
    pub run_dir: PathBuf,
    /// Data root, `/var/lib/cask` by default.
    pub data_dir: PathBuf,
}

impl Default for RuntimePaths {
    fn default() -> Self {
        Self {
            run_dir: PathBuf::from(constants::DEFAULT_RUN_DIR),
            data_dir: PathBuf::from(constants::DEFAULT_DATA_DIR),
        }
    }
}

impl RuntimePaths {
    /// Places both roots under `base`, for tests and scratch setups.
    #[must_use]
    pub fn rooted(base: &Path) -> Self {
        Self {
            run_dir: base.join("run"),
            data_dir: base.join("lib"),
        }
    }

    /// Per-container runtime directory.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.run_dir.join(name)
    }

    /// Persisted record of a container.
    #[must_use]
    pub fn container_record(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(constants::RECORD_FILE)
    }

    /// Captured stdout/stderr of a detached container.
    #[must_use]
    pub fn container_log(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(constants::LOG_FILE)
    }

    /// Source tarball of an image.
    #[must_use]
    pub fn image_tar(&self, image: &str) -> PathBuf {
        self.data_dir.join("images").join(format!("{image}.tar"))
    }

    /// Extracted read-only layer of an image.
    #[must_use]
    pub fn image_dir(&self, image: &str) -> PathBuf {
        self.data_dir.join("images").join(image)
    }

    /// Per-container writable overlay layer.
    #[must_use]
    pub fn write_layer(&self, name: &str) -> PathBuf {
        self.data_dir.join("layers").join(name)
    }

    /// Per-container overlay work directory.
    #[must_use]
    pub fn work_dir(&self, name: &str) -> PathBuf {
        self.data_dir.join("work").join(name)
    }

    /// Per-container merged overlay mountpoint, used as the container root.
    #[must_use]
    pub fn merged_dir(&self, name: &str) -> PathBuf {
        self.data_dir.join("mnt").join(name)
    }

    /// Directory of persisted network records, one JSON file per network.
    #[must_use]
    pub fn network_dir(&self) -> PathBuf {
        self.run_dir.join("network").join("networks")
    }

    /// Persisted IPAM subnet bitmap map.
    #[must_use]
    pub fn ipam_file(&self) -> PathBuf {
        self.run_dir.join("network").join("ipam").join("subnets.json")
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn default_layout_uses_system_roots() {
        let paths = RuntimePaths::default();
        assert_eq!(
            paths.container_record("web"),
            Path::new("/var/run/cask/web/config.json")
        );
        assert_eq!(
            paths.image_tar("busybox"),
            Path::new("/var/lib/cask/images/busybox.tar")
        );
        assert_eq!(
            paths.merged_dir("web"),
            Path::new("/var/lib/cask/mnt/web")
        );
    }

    #[test]
    fn rooted_layout_stays_under_base() {
        let paths = RuntimePaths::rooted(Path::new("/tmp/scratch"));
        assert!(paths.container_log("db").starts_with("/tmp/scratch/run"));
        assert!(paths.write_layer("db").starts_with("/tmp/scratch/lib"));
        assert!(paths.ipam_file().starts_with("/tmp/scratch/run/network"));
    }
}
