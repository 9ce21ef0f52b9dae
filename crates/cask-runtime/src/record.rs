//! Persisted container state.

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};

use cask_common::error::{CaskError, Result};
use cask_common::types::{ContainerId, ContainerStatus};

/// Everything the runtime remembers about a container between invocations,
/// stored as `config.json` in the container's runtime directory.
///
/// `pid` is kept as a string so "no process" is representable as the empty
/// string; it is non-empty exactly while the record says running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    pub pid: String,
    pub name: String,
    /// Space-joined command line the container was started with.
    pub command: String,
    pub status: ContainerStatus,
    /// Raw `host:container` volume spec, empty when none was given.
    pub volume: String,
    /// Raw `HOST:CONTAINER` port publications.
    pub port_mapping: Vec<String>,
    pub created_at: String,
}

impl ContainerRecord {
    /// Builds the record for a container that just started.
    pub fn running(
        id: &ContainerId,
        name: &str,
        pid: i32,
        command: &[String],
        volume: Option<&str>,
        port_mapping: &[String],
    ) -> Self {
        Self {
            id: id.as_str().to_string(),
            pid: pid.to_string(),
            name: name.to_string(),
            command: command.join(" "),
            status: ContainerStatus::Running,
            volume: volume.unwrap_or_default().to_string(),
            port_mapping: port_mapping.to_vec(),
            created_at: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }

    /// Whether the record describes a live container.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// The recorded pid as a number.
    ///
    /// # Errors
    ///
    /// Returns an error when the record holds no usable pid, which is the
    /// case for stopped and exited containers.
    pub fn parse_pid(&self) -> Result<i32> {
        self.pid.parse().map_err(|_| CaskError::Process {
            message: format!("container {} has no usable pid (got {:?})", self.name, self.pid),
        })
    }

    /// Transitions the record to stopped, clearing the pid.
    pub fn mark_stopped(&mut self) {
        self.status = ContainerStatus::Stopped;
        self.pid.clear();
    }

    /// The volume spec, if one was recorded.
    #[must_use]
    pub fn volume_spec(&self) -> Option<&str> {
        if self.volume.is_empty() {
            None
        } else {
            Some(self.volume.as_str())
        }
    }
}
