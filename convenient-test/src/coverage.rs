//! Coverage instrumentation and report commands

use convenient_java::{ProjectLayout, SourceRole};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

/// Which classes coverage is collected for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageMode {
    #[default]
    None,
    /// Main classes only
    Sources,
    /// Test classes only
    Tests,
    /// Both
    All,
}

impl CoverageMode {
    pub fn is_enabled(self) -> bool {
        self != Self::None
    }

    /// Source roots whose classes appear in the report.
    pub fn roles(self) -> &'static [SourceRole] {
        match self {
            Self::None => &[],
            Self::Sources => &[SourceRole::Main],
            Self::Tests => &[SourceRole::Test],
            Self::All => &[SourceRole::Main, SourceRole::Test],
        }
    }
}

impl fmt::Display for CoverageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Sources => write!(f, "sources"),
            Self::Tests => write!(f, "tests"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for CoverageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "sources" => Ok(Self::Sources),
            "tests" => Ok(Self::Tests),
            "all" => Ok(Self::All),
            other => Err(format!("unknown coverage mode '{other}'")),
        }
    }
}

/// Where coverage data and reports are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoveragePaths {
    pub exec_file: PathBuf,
    pub html_dir: PathBuf,
    pub xml_file: PathBuf,
}

impl CoveragePaths {
    /// `<output>/coverage/{jazel.exec,html,coverage.xml}`
    pub fn for_layout(layout: &ProjectLayout) -> Self {
        let dir = layout.root().join(layout.output()).join("coverage");
        Self {
            exec_file: dir.join("jazel.exec"),
            html_dir: dir.join("html"),
            xml_file: dir.join("coverage.xml"),
        }
    }
}

/// JVM flag attaching the coverage agent.
pub fn agent_argument(agent: &Path, exec_file: &Path) -> String {
    format!(
        "-javaagent:{}=destfile={}",
        agent.display(),
        exec_file.display()
    )
}

/// `java -jar <cli> report <exec> (--classfiles <dir> --sourcefiles <dir>)... --html <dir> --xml <file>`
pub fn report_command(
    java: &Path,
    cli: &Path,
    layout: &ProjectLayout,
    mode: CoverageMode,
    paths: &CoveragePaths,
) -> Command {
    let mut cmd = Command::new(java);
    let _ = cmd
        .current_dir(layout.root())
        .arg("-jar")
        .arg(cli)
        .arg("report")
        .arg(&paths.exec_file);
    for role in mode.roles() {
        let _ = cmd
            .arg("--classfiles")
            .arg(layout.root().join(layout.classes_dir(*role)))
            .arg("--sourcefiles")
            .arg(layout.root().join(layout.source_root(*role)));
    }
    let _ = cmd
        .arg("--html")
        .arg(&paths.html_dir)
        .arg("--xml")
        .arg(&paths.xml_file);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for mode in ["none", "sources", "tests", "all"] {
            assert_eq!(mode.parse::<CoverageMode>().unwrap().to_string(), mode);
        }
        assert_eq!("ALL".parse::<CoverageMode>().unwrap(), CoverageMode::All);
        assert!("most".parse::<CoverageMode>().is_err());
    }

    #[test]
    fn test_report_command_pairs() {
        let layout = ProjectLayout::new("/p");
        let paths = CoveragePaths::for_layout(&layout);
        let cmd = report_command(
            Path::new("java"),
            Path::new("/opt/jacococli.jar"),
            &layout,
            CoverageMode::Sources,
            &paths,
        );
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(
            args,
            vec![
                "-jar",
                "/opt/jacococli.jar",
                "report",
                "/p/build/coverage/jazel.exec",
                "--classfiles",
                "/p/build/classes/main",
                "--sourcefiles",
                "/p/src/main/java",
                "--html",
                "/p/build/coverage/html",
                "--xml",
                "/p/build/coverage/coverage.xml",
            ]
        );
    }

    #[test]
    fn test_all_reports_both_roots() {
        let layout = ProjectLayout::new("/p");
        let cmd = report_command(
            Path::new("java"),
            Path::new("cli.jar"),
            &layout,
            CoverageMode::All,
            &CoveragePaths::for_layout(&layout),
        );
        let classfiles = cmd.get_args().filter(|a| *a == "--classfiles").count();
        assert_eq!(classfiles, 2);
    }

    #[test]
    fn test_agent_argument() {
        assert_eq!(
            agent_argument(Path::new("/opt/agent.jar"), Path::new("/p/build/coverage/jazel.exec")),
            "-javaagent:/opt/agent.jar=destfile=/p/build/coverage/jazel.exec"
        );
    }
}
