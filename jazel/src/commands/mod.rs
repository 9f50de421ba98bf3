//! Subcommand implementations

use crate::cli::{Cli, Commands};
use crate::config::ProjectConfig;
use crate::error::{CliError, Result};
use convenient_java::ProjectLayout;
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod build;
pub mod clean;
pub mod test;

/// An opened project: its root, configuration and layout
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub layout: ProjectLayout,
}

impl Project {
    /// Open the project at `root`, reading `jazel.yml` if present.
    ///
    /// The root is canonicalized, so a relative `--project` works from any
    /// working directory.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(CliError::MissingProject(root.to_path_buf()));
        }
        let root = root.canonicalize()?;
        let config = ProjectConfig::load(&root)?;
        let layout = config.layout(&root);
        debug!("Opened project {} ({:?})", root.display(), layout);
        Ok(Self {
            root,
            config,
            layout,
        })
    }
}

/// Run the selected command and return the process exit code.
pub fn execute(cli: &Cli) -> Result<i32> {
    let project = Project::open(&cli.project)?;
    match &cli.command {
        Commands::Build => build::run(&project),
        Commands::Test(args) => test::run(&project, args, cli.verbose, cli.log_file.as_deref()),
        Commands::Clean => clean::run(&project),
    }
}
