//! Domain primitive types used across the cask workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a container instance.
///
/// Ten hex characters drawn from a v4 UUID; short enough to type, long
/// enough that collisions are not a practical concern for a single host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from an existing string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random container ID.
    #[must_use]
    pub fn generate() -> Self {
        let mut hex = uuid::Uuid::new_v4().simple().to_string();
        hex.truncate(10);
        Self(hex)
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a container as persisted in its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerStatus {
    /// Container process is running.
    #[serde(rename = "running")]
    Running,
    /// Container was stopped by an explicit signal.
    #[serde(rename = "stop")]
    Stopped,
    /// Container process exited on its own.
    #[serde(rename = "exit")]
    Exited,
}

impl ContainerStatus {
    /// Whether the record describes a live container process.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ContainerStatus {
    // f.pad keeps width specifiers working in tabular output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.pad("running"),
            Self::Stopped => f.pad("stop"),
            Self::Exited => f.pad("exit"),
        }
    }
}

/// Resource limits for a container.
///
/// Values are raw strings written verbatim to the cgroup v1 control files,
/// so kernel suffixes like `100m` pass through untouched. Unset fields mean
/// no limit is applied for that controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory limit (`memory.limit_in_bytes`).
    pub memory: Option<String>,
    /// CPU shares, a relative weight (`cpu.shares`).
    pub cpu_shares: Option<String>,
    /// CPU set, e.g. `0-2,7` (`cpuset.cpus`).
    pub cpuset: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_id_is_ten_chars() {
        let id = ContainerId::generate();
        assert_eq!(id.as_str().len(), 10);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn container_ids_are_unique() {
        let a = ContainerId::generate();
        let b = ContainerId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn status_wire_strings() {
        assert_eq!(
            serde_json::to_string(&ContainerStatus::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(
            serde_json::to_string(&ContainerStatus::Stopped).unwrap(),
            "\"stop\""
        );
        assert_eq!(
            serde_json::to_string(&ContainerStatus::Exited).unwrap(),
            "\"exit\""
        );
        let status: ContainerStatus = serde_json::from_str("\"stop\"").unwrap();
        assert_eq!(status, ContainerStatus::Stopped);
    }

    #[test]
    fn default_limits_set_nothing() {
        let limits = ResourceLimits::default();
        assert!(limits.memory.is_none());
        assert!(limits.cpu_shares.is_none());
        assert!(limits.cpuset.is_none());
    }
}
