//! Lifecycle flows over a real runtime directory.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use tempfile::TempDir;

use cask_common::config::RuntimePaths;
use cask_common::error::CaskError;
use cask_common::types::ContainerId;
use cask_runtime::{ContainerRecord, Engine, Registry};

fn record_named(name: &str, pid: i32) -> ContainerRecord {
    ContainerRecord::running(
        &ContainerId::generate(),
        name,
        pid,
        &["sleep".to_string(), "30".to_string()],
        None,
        &[],
    )
}

#[test]
fn stop_terminates_the_process_and_rewrites_the_record() {
    let dir = TempDir::new().unwrap();
    let paths = RuntimePaths::rooted(dir.path());
    let registry = Registry::new(paths.clone());
    let engine = Engine::new(paths);

    // A real child stands in for a container's init process.
    let mut child = std::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .unwrap();
    registry
        .save(&record_named("sleeper", child.id() as i32))
        .unwrap();

    engine.stop("sleeper").unwrap();

    let status = child.wait().unwrap();
    assert!(!status.success());

    let record = registry.get("sleeper").unwrap();
    assert!(!record.is_running());
    assert!(record.pid.is_empty());
}

#[test]
fn stop_with_an_unusable_pid_leaves_the_record_alone() {
    let dir = TempDir::new().unwrap();
    let paths = RuntimePaths::rooted(dir.path());
    let registry = Registry::new(paths.clone());
    let engine = Engine::new(paths);

    let mut record = record_named("broken", 1);
    record.pid = "not-a-pid".to_string();
    registry.save(&record).unwrap();

    assert!(matches!(
        engine.stop("broken").unwrap_err(),
        CaskError::Process { .. }
    ));
    assert_eq!(registry.get("broken").unwrap(), record);
}

#[test]
fn records_are_running_exactly_while_they_hold_a_pid() {
    let dir = TempDir::new().unwrap();
    let registry = Registry::new(RuntimePaths::rooted(dir.path()));

    let mut record = record_named("web", 4242);
    registry.save(&record).unwrap();
    let loaded = registry.get("web").unwrap();
    assert!(loaded.is_running());
    assert!(!loaded.pid.is_empty());

    record.mark_stopped();
    registry.save(&record).unwrap();
    let loaded = registry.get("web").unwrap();
    assert!(!loaded.is_running());
    assert!(loaded.pid.is_empty());
}

#[test]
fn removing_a_running_container_fails_and_keeps_the_record() {
    let dir = TempDir::new().unwrap();
    let paths = RuntimePaths::rooted(dir.path());
    let registry = Registry::new(paths.clone());
    let engine = Engine::new(paths);

    registry.save(&record_named("busy", 987_654)).unwrap();
    assert!(engine.remove("busy").is_err());
    assert!(registry.get("busy").unwrap().is_running());

    // Once stopped on disk, removal goes through.
    let mut record = registry.get("busy").unwrap();
    record.mark_stopped();
    registry.save(&record).unwrap();
    engine.remove("busy").unwrap();
    assert!(matches!(
        registry.get("busy").unwrap_err(),
        CaskError::NotFound { .. }
    ));
}
