//! # cask-core
//!
//! Linux isolation primitives for the cask runtime: cgroup v1 resource
//! controllers and the layered container filesystem (overlay workspaces,
//! bind-mounted volumes, pivot_root, and the mounts an init process needs).
//!
//! Everything here targets Linux; the runtime has no meaning elsewhere.

pub mod cgroup;
pub mod filesystem;
