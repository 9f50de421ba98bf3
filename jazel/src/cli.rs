//! Command-line interface
//!
//! - `build`: compile what changed since the last build
//! - `test`: build, then run the test classes that need running
//! - `clean`: remove compiled classes, ledgers and coverage data

use clap::{Args, Parser, Subcommand};
use convenient_test::CoverageMode;
use std::path::PathBuf;

/// Jazel - incremental build-and-test engine for Java projects
#[derive(Debug, Parser)]
#[command(name = "jazel")]
#[command(about = "Incremental build-and-test engine for Java projects")]
#[command(version)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Debug logging, also passed to the test runtime
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compile changed sources and everything depending on them
    Build,

    /// Build, then run stale test classes
    Test(TestArgs),

    /// Remove the output directory
    Clean,
}

#[derive(Debug, Clone, Args)]
pub struct TestArgs {
    /// Run every test class, ignoring and not writing cached results
    #[arg(long)]
    pub no_cache: bool,

    /// Collect coverage: none, sources, tests or all
    #[arg(long, default_value = "none")]
    pub coverage: CoverageMode,

    /// Test worker threads (defaults to jazel.yml, then the CPU count)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Ask the runtime to wait for a profiler before running
    #[arg(long)]
    pub profiler_pause: bool,
}
