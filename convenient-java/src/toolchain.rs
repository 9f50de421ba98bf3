//! The installed Java toolchain: `javac` and `java`

use crate::error::{BuildError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::debug;

/// Captured result of a child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

/// Run `cmd` to completion with captured streams.
pub fn run_captured(mut cmd: Command) -> Result<ProcessOutput> {
    let program = cmd.get_program().to_string_lossy().to_string();
    let start = Instant::now();

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = cmd
        .output()
        .map_err(|source| BuildError::ToolchainLaunch { program, source })?;

    Ok(ProcessOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}

/// Locations of the compiler and runtime executables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaToolchain {
    pub javac: PathBuf,
    pub java: PathBuf,
}

impl Default for JavaToolchain {
    fn default() -> Self {
        Self {
            javac: PathBuf::from("javac"),
            java: PathBuf::from("java"),
        }
    }
}

impl JavaToolchain {
    pub fn new(javac: impl Into<PathBuf>, java: impl Into<PathBuf>) -> Self {
        Self {
            javac: javac.into(),
            java: java.into(),
        }
    }

    /// Version banner of the compiler (`javac 21.0.2`).
    pub fn compiler_version(&self) -> Result<String> {
        probe_version(&self.javac)
    }

    /// Version banner of the runtime (`openjdk version "21.0.2" 2024-01-16`).
    pub fn runtime_version(&self) -> Result<String> {
        probe_version(&self.java)
    }
}

fn probe_version(program: &Path) -> Result<String> {
    let mut cmd = Command::new(program);
    let _ = cmd.arg("-version");
    let output = run_captured(cmd)?;

    // older JDKs print the banner on stderr
    let version = parse_version_banner(&output.combined()).ok_or_else(|| {
        BuildError::UnknownVersion {
            program: program.display().to_string(),
        }
    })?;
    debug!("{} reports {}", program.display(), version);
    Ok(version)
}

/// First line of a `-version` banner that names a version.
///
/// JVM launcher noise (`Picked up JAVA_TOOL_OPTIONS: ...`) is skipped.
pub fn parse_version_banner(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("Picked up"))
        .find(|line| line.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_string)
}
