//! Unified error types for the cask workspace.
//!
//! Lower-level syscall failures are wrapped into these variants at the call
//! site with enough context to locate the failing resource.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CaskError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A mount, unmount, or filesystem-layering operation failed.
    #[error("mount error: {message}")]
    Mount {
        /// Description of the failed mount step.
        message: String,
    },

    /// A network device, address, route, or allocation operation failed.
    #[error("network error: {message}")]
    Network {
        /// Description of the failed network step.
        message: String,
    },

    /// A process-level operation (clone, signal, wait, exec) failed.
    #[error("process error: {message}")]
    Process {
        /// Description of the failed process step.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CaskError>;
