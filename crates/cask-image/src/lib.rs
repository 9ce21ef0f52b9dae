//! # cask-image
//!
//! Image tarball handling for the cask runtime. Images are distributed as
//! plain tarballs of a root filesystem; this crate extracts them into
//! read-only image layers and packs container roots back into tarballs for
//! `cask commit`.

pub mod archive;

pub use archive::{extract_archive, pack_archive};
