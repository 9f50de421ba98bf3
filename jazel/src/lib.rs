//! Jazel - incremental build-and-test engine for Java projects
//!
//! The binary wires the library crates together:
//! - `convenient-java`: source inventory, staleness, compilation, build ledger
//! - `convenient-test`: test discovery, cached execution, reporting, coverage
//!
//! This crate adds the command line, `jazel.yml` and logging setup.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;

pub use cli::{Cli, Commands, TestArgs};
pub use commands::Project;
pub use config::ProjectConfig;
pub use error::{CliError, Result};
