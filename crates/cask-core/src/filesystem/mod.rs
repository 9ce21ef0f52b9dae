//! Container filesystem building blocks.
//!
//! A container root is an overlay of an immutable image layer and a
//! per-container write layer, optionally with host directories bound in as
//! volumes. The init process later pivots into that root and mounts what a
//! PID 1 expects to find.

pub mod mount;
pub mod overlay;
pub mod pivot_root;
pub mod volume;
pub mod workspace;
