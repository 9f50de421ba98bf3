//! Error types for test execution

use convenient_java::{BuildError, StoreError};

/// Errors that stop a test run
///
/// Test failures are never errors; they are outcomes.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test ledger could not be read or written
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The runtime could not be started or probed
    #[error(transparent)]
    Toolchain(#[from] BuildError),

    /// A test container could not be loaded
    #[error("Failed to load test container {class}: {reason}")]
    Load {
        /// Fully qualified class name
        class: String,
        /// Why loading failed
        reason: String,
    },

    /// The build ledger lists no source files at all
    #[error("No source files found in {0}")]
    NoSourceUnits(String),

    /// Worker pool could not be created
    #[error("Failed to create test worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for test operations
pub type Result<T> = std::result::Result<T, TestError>;
