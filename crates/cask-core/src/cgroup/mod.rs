//! Cgroups v1 resource management.
//!
//! Each controller (memory, cpu, cpuset) lives in its own mounted
//! hierarchy; the mountpoints are discovered from `/proc/self/mountinfo`.
//! Controllers are independent and best-effort: a failure in one is
//! collected and reported, never allowed to abort the others.

pub mod cpu;
pub mod cpuset;
pub mod memory;

use std::io::BufRead;
use std::path::{Path, PathBuf};

use cask_common::error::{CaskError, Result};
use cask_common::types::ResourceLimits;

/// One cgroup v1 controller.
///
/// Paths passed to the trait methods are the resolved per-group directory
/// inside the controller's own hierarchy; resolution is the manager's job,
/// which keeps the writers trivially testable against scratch directories.
pub trait Subsystem {
    /// Controller name as it appears in mountinfo options.
    fn name(&self) -> &'static str;

    /// Writes this controller's limit files for the group.
    ///
    /// Unset limits are skipped; the group directory itself must already
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a control file cannot be written.
    fn set(&self, group_dir: &Path, limits: &ResourceLimits) -> Result<()>;

    /// Attaches a process to the group by writing its PID to `tasks`.
    ///
    /// Attaching the same PID twice is idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the `tasks` file cannot be written.
    fn apply(&self, group_dir: &Path, pid: u32) -> Result<()>;

    /// Removes the group directory; a missing group is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing group cannot be removed.
    fn remove(&self, group_dir: &Path) -> Result<()> {
        remove_group_dir(group_dir)
    }
}

/// Writes the PID into the group's `tasks` file.
pub(crate) fn write_tasks(group_dir: &Path, pid: u32) -> Result<()> {
    let tasks = group_dir.join("tasks");
    std::fs::write(&tasks, pid.to_string()).map_err(|e| CaskError::Io {
        path: tasks,
        source: e,
    })
}

/// Writes one limit value into a control file under the group.
pub(crate) fn write_control(group_dir: &Path, file: &str, value: &str) -> Result<()> {
    let path = group_dir.join(file);
    std::fs::write(&path, value).map_err(|e| CaskError::Io { path, source: e })
}

fn remove_group_dir(group_dir: &Path) -> Result<()> {
    if !group_dir.exists() {
        return Ok(());
    }
    // Cgroupfs only supports rmdir on groups; the recursive form is the
    // fallback for plain directories in tests.
    if std::fs::remove_dir(group_dir).is_ok() {
        return Ok(());
    }
    std::fs::remove_dir_all(group_dir).map_err(|e| CaskError::Io {
        path: group_dir.to_path_buf(),
        source: e,
    })
}

/// A single controller failure captured by the manager.
#[derive(Debug)]
pub struct SubsystemFailure {
    /// Name of the controller that failed.
    pub subsystem: &'static str,
    /// The failure itself.
    pub error: CaskError,
}

/// Outcome of driving one operation across all controllers.
///
/// Controllers are best-effort, so the manager never returns early; it
/// records every failure here and lets the caller decide how loudly to
/// complain.
#[derive(Debug, Default)]
pub struct SubsystemReport {
    failures: Vec<SubsystemFailure>,
}

impl SubsystemReport {
    /// Whether every controller succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// The collected failures, one per failing controller.
    #[must_use]
    pub fn failures(&self) -> &[SubsystemFailure] {
        &self.failures
    }

    fn record(&mut self, subsystem: &'static str, error: CaskError) {
        self.failures.push(SubsystemFailure { subsystem, error });
    }

    /// Logs every failure at warn level, tagged with the operation name.
    pub fn log(&self, operation: &str) {
        for failure in &self.failures {
            tracing::warn!(
                subsystem = failure.subsystem,
                operation,
                error = %failure.error,
                "cgroup controller failed"
            );
        }
    }
}

/// Drives all v1 controllers for one named group.
pub struct CgroupManager {
    group: String,
    subsystems: Vec<Box<dyn Subsystem>>,
}

impl std::fmt::Debug for CgroupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CgroupManager")
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

impl CgroupManager {
    /// Creates a manager for the given group path, e.g. `cask/web`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            subsystems: vec![
                Box::new(memory::MemorySubsystem),
                Box::new(cpu::CpuSubsystem),
                Box::new(cpuset::CpusetSubsystem),
            ],
        }
    }

    /// The group path this manager drives.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Creates the group in every mounted hierarchy and writes the limits.
    ///
    /// The group is created even when no limit is set, so a later
    /// [`CgroupManager::apply`] finds it.
    pub fn set(&self, limits: &ResourceLimits) -> SubsystemReport {
        let mut report = SubsystemReport::default();
        for subsystem in &self.subsystems {
            match self.group_dir(subsystem.name(), true) {
                Ok(dir) => {
                    if let Err(e) = subsystem.set(&dir, limits) {
                        report.record(subsystem.name(), e);
                    }
                }
                Err(e) => report.record(subsystem.name(), e),
            }
        }
        report
    }

    /// Attaches the PID to the group in every mounted hierarchy.
    pub fn apply(&self, pid: u32) -> SubsystemReport {
        let mut report = SubsystemReport::default();
        for subsystem in &self.subsystems {
            match self.group_dir(subsystem.name(), false) {
                Ok(dir) => {
                    if let Err(e) = subsystem.apply(&dir, pid) {
                        report.record(subsystem.name(), e);
                    }
                }
                Err(e) => report.record(subsystem.name(), e),
            }
        }
        report
    }

    /// Removes the group from every mounted hierarchy.
    pub fn destroy(&self) -> SubsystemReport {
        let mut report = SubsystemReport::default();
        for subsystem in &self.subsystems {
            match self.group_dir(subsystem.name(), false) {
                Ok(dir) => {
                    if let Err(e) = subsystem.remove(&dir) {
                        report.record(subsystem.name(), e);
                    }
                }
                // Hierarchy not mounted: nothing to destroy.
                Err(_) => {}
            }
        }
        report
    }

    /// Resolves the group directory inside one controller's hierarchy.
    fn group_dir(&self, subsystem: &str, create: bool) -> Result<PathBuf> {
        let root = find_mountpoint(subsystem).ok_or(CaskError::NotFound {
            kind: "cgroup hierarchy",
            id: subsystem.to_string(),
        })?;
        let dir = root.join(&self.group);
        if !dir.exists() {
            if !create {
                return Err(CaskError::NotFound {
                    kind: "cgroup",
                    id: dir.display().to_string(),
                });
            }
            std::fs::create_dir_all(&dir).map_err(|e| CaskError::Io {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(dir)
    }
}

/// Finds the hierarchy mountpoint for a controller, if it is mounted.
#[must_use]
pub fn find_mountpoint(subsystem: &str) -> Option<PathBuf> {
    let file = std::fs::File::open("/proc/self/mountinfo").ok()?;
    mountpoint_from(std::io::BufReader::new(file), subsystem)
}

/// Scans mountinfo text for a hierarchy carrying the controller option.
///
/// The controller names sit in the final (superblock options) field; the
/// mountpoint is the fifth field.
fn mountpoint_from(reader: impl BufRead, subsystem: &str) -> Option<PathBuf> {
    for line in reader.lines() {
        let line = line.ok()?;
        let fields: Vec<&str> = line.split(' ').collect();
        let options = fields.last()?;
        if options.split(',').any(|opt| opt == subsystem) {
            return fields.get(4).map(PathBuf::from);
        }
    }
    None
}
