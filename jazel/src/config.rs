//! Project configuration (`jazel.yml`)
//!
//! Every key is optional:
//!
//! ```yaml
//! sources:
//!   main: src/main/java
//!   test: src/test/java
//! output: build
//! classpath:
//!   - lib/junit.jar
//! toolchain:
//!   javac: /opt/jdk/bin/javac
//!   java: /opt/jdk/bin/java
//!   coverageAgent: lib/jacocoagent.jar
//!   coverageCli: lib/jacococli.jar
//! compiler:
//!   lint: ["-Xlint:all"]
//!   args: ["--release", "21"]
//! test:
//!   entryPoint: org.jazel.runtime.ContainerMain
//!   cache: true
//!   jobs: 8
//!   ignoreFrames: ["org.junit."]
//! ```

use crate::error::{CliError, Result};
use convenient_java::{CompilerOptions, JavaToolchain, ProjectLayout};
use convenient_test::FrameFilter;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration file name, looked up in the project root
pub const CONFIG_FILE: &str = "jazel.yml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub sources: SourcesConfig,
    pub output: PathBuf,
    /// Library jars and class directories for compilation and tests
    pub classpath: Vec<PathBuf>,
    pub toolchain: ToolchainConfig,
    pub compiler: CompilerConfig,
    pub test: TestConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            sources: SourcesConfig::default(),
            output: PathBuf::from("build"),
            classpath: Vec::new(),
            toolchain: ToolchainConfig::default(),
            compiler: CompilerConfig::default(),
            test: TestConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    pub main: PathBuf,
    pub test: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            main: PathBuf::from("src/main/java"),
            test: PathBuf::from("src/test/java"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ToolchainConfig {
    pub javac: PathBuf,
    pub java: PathBuf,
    pub coverage_agent: Option<PathBuf>,
    pub coverage_cli: Option<PathBuf>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        let toolchain = JavaToolchain::default();
        Self {
            javac: toolchain.javac,
            java: toolchain.java,
            coverage_agent: None,
            coverage_cli: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub lint: Vec<String>,
    pub args: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        let options = CompilerOptions::default();
        Self {
            lint: options.lint,
            args: options.args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TestConfig {
    pub entry_point: Option<String>,
    pub cache: bool,
    pub jobs: Option<usize>,
    /// Extra stack frame prefixes hidden from failure reports
    pub ignore_frames: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            entry_point: None,
            cache: true,
            jobs: None,
            ignore_frames: Vec::new(),
        }
    }
}

impl ProjectConfig {
    /// Load `jazel.yml` from `root`, or the defaults if there is none.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            debug!("No {} in {}, using defaults", CONFIG_FILE, root.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Self::parse(&content).map_err(|reason| CliError::Config { path, reason })
    }

    /// Parse configuration text. An empty document yields the defaults.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn layout(&self, root: &Path) -> ProjectLayout {
        ProjectLayout::new(root)
            .with_sources(&self.sources.main, &self.sources.test)
            .with_output(&self.output)
    }

    pub fn toolchain(&self) -> JavaToolchain {
        JavaToolchain::new(&self.toolchain.javac, &self.toolchain.java)
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            lint: self.compiler.lint.clone(),
            args: self.compiler.args.clone(),
        }
    }

    pub fn frame_filter(&self) -> FrameFilter {
        FrameFilter::default().with_ignored(self.test.ignore_frames.iter().cloned())
    }

    /// Test worker count: the configured value, else one per CPU.
    pub fn jobs(&self) -> usize {
        self.test.jobs.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convenient_java::SourceRole;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = ProjectConfig::load(tmp.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert!(config.test.cache);
        assert_eq!(config.compiler.lint, vec!["-Xlint:all"]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = ProjectConfig::parse(
            "sources:\n  main: app/src\noutput: out\ntest:\n  cache: false\n  jobs: 3\n",
        )
        .unwrap();
        assert_eq!(config.sources.main, PathBuf::from("app/src"));
        assert_eq!(config.sources.test, PathBuf::from("src/test/java"));
        assert!(!config.test.cache);
        assert_eq!(config.jobs(), 3);

        let layout = config.layout(Path::new("/work"));
        assert_eq!(layout.source_root(SourceRole::Main), Path::new("app/src"));
        assert_eq!(layout.output(), Path::new("out"));
    }

    #[test]
    fn test_camel_case_keys() {
        let config = ProjectConfig::parse(
            "toolchain:\n  coverageAgent: lib/agent.jar\ntest:\n  entryPoint: my.Main\n  ignoreFrames: [org.junit.]\n",
        )
        .unwrap();
        assert_eq!(config.toolchain.coverage_agent, Some(PathBuf::from("lib/agent.jar")));
        assert_eq!(config.test.entry_point.as_deref(), Some("my.Main"));
        assert!(!config.frame_filter().keeps("at org.junit.Assert.fail(Assert.java:89)"));
    }

    #[test]
    fn test_malformed_file_is_a_config_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "output: [unclosed\n").unwrap();
        let err = ProjectConfig::load(tmp.path()).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
        assert_eq!(err.exit_code(), -1);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(ProjectConfig::parse("sourcez: {}\n").is_err());
    }
}
