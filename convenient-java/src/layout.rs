//! Project directory layout

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Which source root a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    /// Production sources
    Main,
    /// Test sources, compiled against the main output
    Test,
}

impl SourceRole {
    /// Both roles in compilation order.
    pub const ALL: [SourceRole; 2] = [SourceRole::Main, SourceRole::Test];
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Where sources, outputs and ledgers live, relative to the project root.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    main_sources: PathBuf,
    test_sources: PathBuf,
    output: PathBuf,
}

impl ProjectLayout {
    /// Build ledger file name (inside the output directory)
    pub const BUILD_LEDGER: &'static str = "jazel-build.json";
    /// Test ledger file name (inside the output directory)
    pub const TEST_LEDGER: &'static str = "jazel-tests.json";

    /// Conventional Maven-style layout under `root`.
    ///
    /// A relative root is resolved against the current directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            root: std::path::absolute(&root).unwrap_or(root),
            main_sources: PathBuf::from("src/main/java"),
            test_sources: PathBuf::from("src/test/java"),
            output: PathBuf::from("build"),
        }
    }

    /// Override the main and test source roots.
    #[must_use]
    pub fn with_sources(mut self, main: impl Into<PathBuf>, test: impl Into<PathBuf>) -> Self {
        self.main_sources = main.into();
        self.test_sources = test.into();
        self
    }

    /// Override the build output directory.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source root for `role`, relative to the project root.
    pub fn source_root(&self, role: SourceRole) -> &Path {
        match role {
            SourceRole::Main => &self.main_sources,
            SourceRole::Test => &self.test_sources,
        }
    }

    /// Build output area, relative to the project root.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Compiled class directory for `role`, relative to the project root.
    pub fn classes_dir(&self, role: SourceRole) -> PathBuf {
        self.output.join("classes").join(role.to_string())
    }

    /// Absolute path of the build ledger.
    pub fn build_ledger_path(&self) -> PathBuf {
        self.root.join(&self.output).join(Self::BUILD_LEDGER)
    }

    /// Absolute path of the test ledger.
    pub fn test_ledger_path(&self) -> PathBuf {
        self.root.join(&self.output).join(Self::TEST_LEDGER)
    }

    /// Resolve a project-relative ledger path against the root.
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Project-relative, `/`-separated form of `path`.
    ///
    /// A path under the root loses the root prefix; any other relative
    /// path is taken as project-relative already. Absolute paths outside
    /// the project yield `None`.
    pub fn relative(&self, path: &Path) -> Option<String> {
        if let Ok(rest) = path.strip_prefix(&self.root) {
            return Some(to_slash(rest));
        }
        if path.is_absolute() {
            return None;
        }
        Some(to_slash(path))
    }

    /// Role of a project-relative source path, by source root prefix.
    pub fn role_of(&self, relative: &str) -> Option<SourceRole> {
        SourceRole::ALL
            .into_iter()
            .find(|role| Path::new(relative).starts_with(self.source_root(*role)))
    }

    /// Whether a project-relative path lies in the build output area.
    pub fn is_output(&self, relative: &Path) -> bool {
        relative.starts_with(&self.output)
    }
}

/// Join path components with `/` regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
