//! On-disk registry of container records.
//!
//! One directory per container under the runtime root, each holding a
//! `config.json` record (and, for detached containers, the log file). The
//! directory name is the container name, so lookups never need an index.

use std::fs;

use tracing::{debug, warn};

use cask_common::config::RuntimePaths;
use cask_common::error::{CaskError, Result};

use crate::record::ContainerRecord;

/// Reads and writes container records under the runtime root.
#[derive(Debug, Clone)]
pub struct Registry {
    paths: RuntimePaths,
}

impl Registry {
    #[must_use]
    pub fn new(paths: RuntimePaths) -> Self {
        Self { paths }
    }

    /// Persists a record, creating its directory on first save. Saving an
    /// existing record overwrites it.
    pub fn save(&self, record: &ContainerRecord) -> Result<()> {
        let dir = self.paths.container_dir(&record.name);
        fs::create_dir_all(&dir).map_err(|err| CaskError::Io {
            path: dir,
            source: err,
        })?;
        let path = self.paths.container_record(&record.name);
        let data = serde_json::to_string(record)?;
        fs::write(&path, data).map_err(|err| CaskError::Io { path, source: err })
    }

    /// Loads the record for `name`.
    pub fn get(&self, name: &str) -> Result<ContainerRecord> {
        let path = self.paths.container_record(name);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CaskError::NotFound {
                    kind: "container",
                    id: name.to_string(),
                });
            }
            Err(err) => return Err(CaskError::Io { path, source: err }),
        };
        Ok(serde_json::from_str(&data)?)
    }

    /// Loads every record under the runtime root.
    ///
    /// Directories without a record file are not containers (the network
    /// state lives under the same root) and are silently skipped; entries
    /// whose record exists but cannot be read or parsed are skipped with a
    /// warning.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        let entries = match fs::read_dir(&self.paths.run_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(CaskError::Io {
                    path: self.paths.run_dir.clone(),
                    source: err,
                });
            }
        };

        let mut records = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else { continue };
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let record_path = self.paths.container_record(&name);
            if !record_path.exists() {
                debug!(entry = %name, "skipping non-container entry");
                continue;
            }
            match self.get(&name) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(container = %name, error = %err, "skipping unreadable record");
                }
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Removes a container's runtime directory, record included. Removing
    /// a container that is already gone succeeds.
    pub fn delete(&self, name: &str) -> Result<()> {
        let dir = self.paths.container_dir(name);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CaskError::Io {
                path: dir,
                source: err,
            }),
        }
    }
}
