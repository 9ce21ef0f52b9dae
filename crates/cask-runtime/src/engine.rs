//! Container lifecycle orchestration.
//!
//! The engine wires the pieces together in a fixed order: workspace, init
//! child, cgroups, record, network, then the command release. Interactive
//! containers are waited on and torn down here; detached ones leave their
//! record and workspace behind for `stop` and `rm`.

use std::fs::{self, File};
use std::path::PathBuf;

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use tracing::{error, info, warn};

use cask_common::config::RuntimePaths;
use cask_common::constants::{CGROUP_PARENT, ENV_EXEC_CMD, ENV_EXEC_PID};
use cask_common::error::{CaskError, Result};
use cask_common::types::{ContainerId, ResourceLimits};
use cask_core::cgroup::CgroupManager;
use cask_core::filesystem::workspace;
use cask_net::NetworkManager;

use crate::nsenter;
use crate::process;
use crate::record::ContainerRecord;
use crate::registry::Registry;

/// Options shaping one `run` invocation.
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Attach the container to the current terminal and wait for it.
    pub tty: bool,
    /// Start the container in the background.
    pub detach: bool,
    /// Container name; defaults to the generated id.
    pub name: Option<String>,
    /// Raw `host:container` volume spec.
    pub volume: Option<String>,
    /// Extra `KEY=VALUE` environment entries for the container process.
    pub env: Vec<String>,
    /// Network to attach to.
    pub network: Option<String>,
    /// Raw `HOST:CONTAINER` port publications.
    pub port_mappings: Vec<String>,
    /// Cgroup resource limits.
    pub limits: ResourceLimits,
}

/// Drives containers through their lifecycle against one runtime layout.
#[derive(Debug)]
pub struct Engine {
    paths: RuntimePaths,
    registry: Registry,
}

impl Engine {
    #[must_use]
    pub fn new(paths: RuntimePaths) -> Self {
        let registry = Registry::new(paths.clone());
        Self { paths, registry }
    }

    /// Creates and starts a container.
    ///
    /// In tty mode this blocks until the container exits, then tears down
    /// cgroup, workspace and record. In detached mode it returns as soon
    /// as the command has been released to init.
    pub fn run(&self, image: &str, command: &[String], options: &RunOptions) -> Result<()> {
        let id = ContainerId::generate();
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| id.as_str().to_string());
        info!(container = %name, id = %id, image, "creating container");

        workspace::create(&self.paths, options.volume.as_deref(), image, &name);

        let log_file = if options.detach {
            Some(self.create_log_file(&name)?)
        } else {
            None
        };

        let (pid, sender) = process::spawn_init(
            &self.paths.merged_dir(&name),
            &options.env,
            log_file.as_ref(),
        )?;
        info!(container = %name, pid = pid.as_raw(), "init process started");

        let cgroup = CgroupManager::new(format!("{CGROUP_PARENT}/{name}"));
        cgroup.set(&options.limits).log("set limits");
        cgroup.apply(pid.as_raw() as u32).log("attach pid");

        let record = ContainerRecord::running(
            &id,
            &name,
            pid.as_raw(),
            command,
            options.volume.as_deref(),
            &options.port_mappings,
        );
        self.registry.save(&record)?;

        if let Some(network) = options.network.as_deref() {
            if let Err(err) = self.attach_network(network, &id, pid, &options.port_mappings) {
                error!(container = %name, network, error = %err, "network attach failed");
                if options.tty {
                    self.teardown(&record, &cgroup);
                }
                return Err(err);
            }
        }

        if let Err(err) = sender.send(command) {
            if options.tty {
                self.teardown(&record, &cgroup);
            }
            return Err(err);
        }

        if options.tty {
            wait_for(pid);
            self.teardown(&record, &cgroup);
        }
        Ok(())
    }

    /// Sends SIGTERM to the container's init process and records it as
    /// stopped. The record is left untouched when the signal cannot be
    /// delivered.
    pub fn stop(&self, name: &str) -> Result<()> {
        let mut record = self.registry.get(name)?;
        let pid = record.parse_pid()?;
        kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(|err| CaskError::Process {
            message: format!("stopping container {name} (pid {pid}): {err}"),
        })?;
        record.mark_stopped();
        self.registry.save(&record)?;
        info!(container = name, pid, "container stopped");
        Ok(())
    }

    /// Removes a stopped container: workspace leftovers, cgroup group, and
    /// the record. Running containers are refused.
    pub fn remove(&self, name: &str) -> Result<()> {
        let record = self.registry.get(name)?;
        if record.is_running() {
            return Err(CaskError::Process {
                message: format!("container {name} is running; stop it first"),
            });
        }
        workspace::remove(&self.paths, record.volume_spec(), name);
        CgroupManager::new(format!("{CGROUP_PARENT}/{name}"))
            .destroy()
            .log("destroy group");
        self.registry.delete(name)?;
        info!(container = name, "container removed");
        Ok(())
    }

    /// All known container records, sorted by name.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        self.registry.list()
    }

    /// Captured output of a detached container.
    pub fn logs(&self, name: &str) -> Result<String> {
        let record = self.registry.get(name)?;
        let path = self.paths.container_log(&record.name);
        fs::read_to_string(&path).map_err(|err| CaskError::Io { path, source: err })
    }

    /// Packs the container's merged root into an image tarball, returning
    /// the written path.
    pub fn commit(&self, name: &str, image: &str) -> Result<PathBuf> {
        let merged = self.paths.merged_dir(name);
        let tar = self.paths.image_tar(image);
        let bytes = cask_image::pack_archive(&merged, &tar)?;
        info!(container = name, image, bytes, path = %tar.display(), "container committed");
        Ok(tar)
    }

    /// Runs a command inside a running container, returning its exit
    /// status.
    ///
    /// The current binary is re-executed with the namespace-entry trigger
    /// variables set; the fresh process does the setns dance (see
    /// [`crate::nsenter`]) before it can pick up any threads.
    pub fn exec(&self, name: &str, command: &[String]) -> Result<i32> {
        let record = self.registry.get(name)?;
        if !record.is_running() {
            return Err(CaskError::Process {
                message: format!("container {name} is not running"),
            });
        }
        let joined = command.join(" ");
        info!(container = name, pid = %record.pid, command = %joined, "entering container");
        let status = std::process::Command::new("/proc/self/exe")
            .env(ENV_EXEC_PID, &record.pid)
            .env(ENV_EXEC_CMD, &joined)
            .status()
            .map_err(|err| CaskError::Process {
                message: format!("re-executing for namespace entry: {err}"),
            })?;
        Ok(nsenter::exit_code(status))
    }

    fn attach_network(
        &self,
        network: &str,
        id: &ContainerId,
        pid: Pid,
        port_mappings: &[String],
    ) -> Result<()> {
        let manager = NetworkManager::new(&self.paths)?;
        manager.connect(network, id.as_str(), pid.as_raw(), port_mappings)
    }

    /// Best-effort removal of everything `run` built up. Failures are
    /// logged and teardown continues.
    fn teardown(&self, record: &ContainerRecord, cgroup: &CgroupManager) {
        cgroup.destroy().log("destroy group");
        workspace::remove(&self.paths, record.volume_spec(), &record.name);
        if let Err(err) = self.registry.delete(&record.name) {
            warn!(container = %record.name, error = %err, "removing record failed");
        }
    }

    fn create_log_file(&self, name: &str) -> Result<File> {
        let dir = self.paths.container_dir(name);
        fs::create_dir_all(&dir).map_err(|err| CaskError::Io {
            path: dir,
            source: err,
        })?;
        let path = self.paths.container_log(name);
        File::create(&path).map_err(|err| CaskError::Io { path, source: err })
    }
}

fn wait_for(pid: Pid) {
    match waitpid(pid, None) {
        Ok(WaitStatus::Exited(_, code)) => info!(pid = pid.as_raw(), code, "container exited"),
        Ok(WaitStatus::Signaled(_, signal, _)) => {
            info!(pid = pid.as_raw(), signal = %signal, "container killed by signal");
        }
        Ok(status) => warn!(pid = pid.as_raw(), ?status, "unexpected wait status"),
        Err(err) => warn!(pid = pid.as_raw(), error = %err, "waiting for container failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> Engine {
        Engine::new(RuntimePaths::rooted(dir.path()))
    }

    fn saved_record(dir: &TempDir, name: &str, pid: i32) -> ContainerRecord {
        let record = ContainerRecord::running(
            &ContainerId::generate(),
            name,
            pid,
            &["top".to_string()],
            None,
            &[],
        );
        Registry::new(RuntimePaths::rooted(dir.path()))
            .save(&record)
            .unwrap();
        record
    }

    #[test]
    fn stop_missing_container_is_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            engine(&dir).stop("ghost").unwrap_err(),
            CaskError::NotFound { kind: "container", .. }
        ));
    }

    #[test]
    fn remove_refuses_a_running_container() {
        let dir = TempDir::new().unwrap();
        saved_record(&dir, "web", 12345);
        let engine = engine(&dir);
        assert!(matches!(
            engine.remove("web").unwrap_err(),
            CaskError::Process { .. }
        ));
        // The record survives the refusal.
        assert!(engine.list().unwrap().iter().any(|r| r.name == "web"));
    }

    #[test]
    fn remove_cleans_up_a_stopped_container() {
        let dir = TempDir::new().unwrap();
        let paths = RuntimePaths::rooted(dir.path());
        let registry = Registry::new(paths.clone());
        let mut record = saved_record(&dir, "web", 12345);
        record.mark_stopped();
        registry.save(&record).unwrap();
        std::fs::create_dir_all(paths.write_layer("web")).unwrap();
        std::fs::create_dir_all(paths.merged_dir("web")).unwrap();

        engine(&dir).remove("web").unwrap();
        assert!(matches!(
            registry.get("web").unwrap_err(),
            CaskError::NotFound { .. }
        ));
        assert!(!paths.write_layer("web").exists());
        assert!(!paths.merged_dir("web").exists());
    }

    #[test]
    fn logs_require_an_existing_container() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            engine(&dir).logs("ghost").unwrap_err(),
            CaskError::NotFound { .. }
        ));
    }

    #[test]
    fn logs_read_the_captured_output() {
        let dir = TempDir::new().unwrap();
        let paths = RuntimePaths::rooted(dir.path());
        saved_record(&dir, "web", 1);
        std::fs::write(paths.container_log("web"), "hello from the container\n").unwrap();
        assert_eq!(
            engine(&dir).logs("web").unwrap(),
            "hello from the container\n"
        );
    }

    #[test]
    fn exec_requires_a_running_container() {
        let dir = TempDir::new().unwrap();
        let paths = RuntimePaths::rooted(dir.path());
        let registry = Registry::new(paths.clone());
        let mut record = saved_record(&dir, "web", 1);
        record.mark_stopped();
        registry.save(&record).unwrap();

        assert!(matches!(
            engine(&dir).exec("web", &["ls".to_string()]).unwrap_err(),
            CaskError::Process { .. }
        ));
    }

    #[test]
    fn commit_fails_without_a_merged_root() {
        let dir = TempDir::new().unwrap();
        assert!(engine(&dir).commit("ghost", "snap").is_err());
    }
}
