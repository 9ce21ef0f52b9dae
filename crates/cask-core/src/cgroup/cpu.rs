//! CPU shares controller (`cpu.shares`).

use std::path::Path;

use cask_common::error::Result;
use cask_common::types::ResourceLimits;

use super::Subsystem;

/// Cgroup v1 cpu controller. Shares are a relative weight under
/// contention, not a hard cap.
#[derive(Debug)]
pub struct CpuSubsystem;

impl Subsystem for CpuSubsystem {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn set(&self, group_dir: &Path, limits: &ResourceLimits) -> Result<()> {
        if let Some(shares) = &limits.cpu_shares {
            super::write_control(group_dir, "cpu.shares", shares)?;
            tracing::debug!(shares, group = %group_dir.display(), "cpu shares set");
        }
        Ok(())
    }

    fn apply(&self, group_dir: &Path, pid: u32) -> Result<()> {
        super::write_tasks(group_dir, pid)
    }
}
