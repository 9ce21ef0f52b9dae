//! Memory controller (`memory.limit_in_bytes`).

use std::path::Path;

use cask_common::error::Result;
use cask_common::types::ResourceLimits;

use super::Subsystem;

/// Cgroup v1 memory controller.
#[derive(Debug)]
pub struct MemorySubsystem;

impl Subsystem for MemorySubsystem {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn set(&self, group_dir: &Path, limits: &ResourceLimits) -> Result<()> {
        if let Some(limit) = &limits.memory {
            super::write_control(group_dir, "memory.limit_in_bytes", limit)?;
            tracing::debug!(limit, group = %group_dir.display(), "memory limit set");
        }
        Ok(())
    }

    fn apply(&self, group_dir: &Path, pid: u32) -> Result<()> {
        super::write_tasks(group_dir, pid)
    }
}
