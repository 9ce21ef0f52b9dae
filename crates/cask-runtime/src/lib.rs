//! # cask-runtime
//!
//! Container lifecycle for cask: persisted records and their registry, the
//! clone-based isolation layer, the in-container init stage, the namespace
//! re-entry bridge behind `exec`, and the engine that drives a container
//! from `run` to teardown.
//!
//! Everything here targets Linux.

pub mod engine;
pub mod init;
pub mod nsenter;
pub mod process;
pub mod record;
pub mod registry;

pub use engine::{Engine, RunOptions};
pub use record::ContainerRecord;
pub use registry::Registry;
