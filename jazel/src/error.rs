//! CLI errors and their exit codes

use convenient_java::BuildError;
use convenient_test::{ExitStatus, TestError};
use std::path::PathBuf;

/// Exit code of a build that finished with compile errors, or a phase that
/// failed outside configuration
pub const FAILURE_EXIT_CODE: i32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Project directory not found: {0}")]
    MissingProject(PathBuf),

    #[error("Invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Coverage mode '{0}' needs toolchain.coverageAgent in jazel.yml")]
    MissingCoverageAgent(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Test(#[from] TestError),
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// Problems that stop anything from running, such as a missing
    /// project, bad configuration, an unreadable ledger or a missing
    /// toolchain, use the configuration-error code.
    pub fn exit_code(&self) -> i32 {
        let configuration = ExitStatus::ConfigurationError.code();
        match self {
            Self::MissingProject(_)
            | Self::Config { .. }
            | Self::LogFile { .. }
            | Self::MissingCoverageAgent(_) => configuration,
            Self::Io(_) => FAILURE_EXIT_CODE,
            Self::Build(e) => build_exit_code(e),
            Self::Test(TestError::NoSourceUnits(_) | TestError::Store(_)) => configuration,
            Self::Test(TestError::Toolchain(e)) => build_exit_code(e),
            Self::Test(_) => FAILURE_EXIT_CODE,
        }
    }
}

fn build_exit_code(error: &BuildError) -> i32 {
    match error {
        BuildError::Store(_)
        | BuildError::ToolchainLaunch { .. }
        | BuildError::UnknownVersion { .. }
        | BuildError::InvalidClasspath(_) => ExitStatus::ConfigurationError.code(),
        _ => FAILURE_EXIT_CODE,
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_problems_exit_negative() {
        assert_eq!(CliError::MissingProject("/nowhere".into()).exit_code(), -1);
        assert_eq!(
            CliError::Test(TestError::NoSourceUnits("/p".into())).exit_code(),
            -1
        );
        let launch = BuildError::ToolchainLaunch {
            program: "javac".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(CliError::Build(launch).exit_code(), -1);
    }

    #[test]
    fn test_compiler_crash_is_a_failure() {
        let crash = BuildError::CompilerFailed {
            program: "javac".into(),
            code: 3,
            stderr: "boom".into(),
        };
        assert_eq!(CliError::Build(crash).exit_code(), FAILURE_EXIT_CODE);
    }
}
