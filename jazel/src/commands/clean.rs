//! `jazel clean`: remove build outputs

use super::Project;
use crate::config::CONFIG_FILE;
use crate::error::{CliError, Result};
use std::fs;
use std::path::Component;
use tracing::info;

/// Remove the output directory: compiled classes, both ledgers and
/// coverage data. Sources are never touched.
pub fn run(project: &Project) -> Result<i32> {
    let relative = project.layout.output();
    if !relative.components().any(|c| matches!(c, Component::Normal(_))) {
        return Err(CliError::Config {
            path: project.root.join(CONFIG_FILE),
            reason: format!("refusing to clean output directory '{}'", relative.display()),
        });
    }
    let output = project.root.join(relative);
    if !output.exists() {
        println!("✨ Nothing to clean");
        return Ok(0);
    }
    fs::remove_dir_all(&output)?;
    info!("Removed {}", output.display());
    println!("🧹 Removed {}", output.display());
    Ok(0)
}
