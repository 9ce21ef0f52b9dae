//! CPU pinning controller (`cpuset.cpus`).

use std::path::Path;

use cask_common::error::Result;
use cask_common::types::ResourceLimits;

use super::Subsystem;

/// Cgroup v1 cpuset controller.
#[derive(Debug)]
pub struct CpusetSubsystem;

impl Subsystem for CpusetSubsystem {
    fn name(&self) -> &'static str {
        "cpuset"
    }

    fn set(&self, group_dir: &Path, limits: &ResourceLimits) -> Result<()> {
        if let Some(cpus) = &limits.cpuset {
            super::write_control(group_dir, "cpuset.cpus", cpus)?;
            tracing::debug!(cpus, group = %group_dir.display(), "cpuset set");
        }
        Ok(())
    }

    fn apply(&self, group_dir: &Path, pid: u32) -> Result<()> {
        super::write_tasks(group_dir, pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_writes_cpus_file() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ResourceLimits {
            cpuset: Some("0-1".to_string()),
            ..ResourceLimits::default()
        };
        CpusetSubsystem.set(dir.path(), &limits).unwrap();
        let written = std::fs::read_to_string(dir.path().join("cpuset.cpus")).unwrap();
        assert_eq!(written, "0-1");
    }
}
