//! Error types for the build pipeline

use crate::store::StoreError;
use std::path::PathBuf;

/// Errors that stop a build
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A source root exists but cannot be enumerated
    #[error("Source root {path} is not readable: {reason}")]
    UnreadableRoot {
        /// Root that failed
        path: PathBuf,
        /// Underlying walk error
        reason: String,
    },

    /// Ledger could not be read or written
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The toolchain executable could not be started
    #[error("Failed to launch {program}: {source}")]
    ToolchainLaunch {
        /// Executable that was invoked
        program: String,
        /// Spawn error
        #[source]
        source: std::io::Error,
    },

    /// The compiler exited non-zero without attributing any error to a source file
    #[error("{program} exited with code {code}: {stderr}")]
    CompilerFailed {
        /// Executable that was invoked
        program: String,
        /// Process exit code
        code: i32,
        /// Captured standard error
        stderr: String,
    },

    /// A `-version` probe produced no usable banner
    #[error("Could not determine the version of {program}")]
    UnknownVersion {
        /// Executable that was probed
        program: String,
    },

    /// A classpath entry contains the platform path separator
    #[error("Invalid classpath entry: {0}")]
    InvalidClasspath(String),
}

/// Result type for build operations
pub type Result<T> = std::result::Result<T, BuildError>;
