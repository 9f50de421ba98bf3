//! Test result tree and counters

use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;
use std::ops::AddAssign;

/// Final status of a leaf test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "Passed"),
            Self::Failed => write!(f, "Failed"),
            Self::Skipped => write!(f, "Skipped"),
        }
    }
}

/// Why a test or group failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    /// Underlying errors, outermost first
    pub causes: Vec<String>,
    /// Stack frames, innermost first
    pub stack_trace: Vec<String>,
}

impl Failure {
    /// Failure without a stack trace.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Assertion failure at the caller, with the current stack trace.
    pub fn assertion(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
            stack_trace: capture_frames(),
        }
    }

    /// Failure from an error and its `source()` chain.
    ///
    /// A [`Failure`] passed as the error is returned unchanged.
    pub fn from_error(error: &(dyn Error + Send + Sync + 'static)) -> Self {
        if let Some(failure) = error.downcast_ref::<Failure>() {
            return failure.clone();
        }
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            causes,
            stack_trace: Vec::new(),
        }
    }

    /// Failure from a caught panic payload.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "test panicked".to_string()
        };
        Self::new(format!("panicked: {message}"))
    }

    #[must_use]
    pub fn with_causes(mut self, causes: Vec<String>) -> Self {
        self.causes = causes;
        self
    }

    #[must_use]
    pub fn with_stack_trace(mut self, stack_trace: Vec<String>) -> Self {
        self.stack_trace = stack_trace;
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for Failure {}

/// Frames of the current backtrace as `symbol (file:line)`.
fn capture_frames() -> Vec<String> {
    let rendered = Backtrace::force_capture().to_string();
    let mut frames: Vec<String> = Vec::new();
    for line in rendered.lines().map(str::trim) {
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(last) = frames.last_mut() {
                last.push_str(&format!(" ({location})"));
            }
        } else if let Some((index, symbol)) = line.split_once(": ")
            && index.chars().all(|c| c.is_ascii_digit())
        {
            frames.push(symbol.to_string());
        }
    }
    frames
}

/// Drops stack frames that belong to the test machinery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFilter {
    ignored: Vec<String>,
}

impl Default for FrameFilter {
    fn default() -> Self {
        Self::new(
            [
                "std::",
                "core::",
                "alloc::",
                "rayon",
                "convenient_test::",
                "__rust",
                "java.lang.reflect.",
                "java.base/java.lang.reflect.",
                "jdk.internal.",
                "java.base/jdk.internal.",
                "sun.reflect.",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }
}

impl FrameFilter {
    /// Filter ignoring frames that start with any of `ignored`.
    pub fn new(ignored: Vec<String>) -> Self {
        Self { ignored }
    }

    /// Add prefixes to the ignore-list.
    #[must_use]
    pub fn with_ignored(mut self, more: impl IntoIterator<Item = String>) -> Self {
        self.ignored.extend(more);
        self
    }

    pub fn keeps(&self, frame: &str) -> bool {
        let frame = frame.trim().trim_start_matches("at ");
        !self.ignored.iter().any(|prefix| frame.starts_with(prefix.as_str()))
    }

    pub fn apply(&self, failure: &mut Failure) {
        failure.stack_trace.retain(|frame| self.keeps(frame));
    }
}

/// Result of one leaf test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    pub failure: Option<Failure>,
    pub skip_reason: Option<String>,
}

/// A node of the result tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Group {
        name: String,
        children: Vec<TestOutcome>,
        /// Error raised while registering the group's children
        error: Option<Failure>,
    },
    Test(TestResult),
}

impl TestOutcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Group { name, .. } => name,
            Self::Test(result) => &result.name,
        }
    }

    /// Tally of this subtree.
    ///
    /// A group registration error counts as one run, failed test.
    pub fn counts(&self) -> Counts {
        match self {
            Self::Test(result) => Counts::of(result.status),
            Self::Group {
                children, error, ..
            } => {
                let mut counts = Counts::default();
                if error.is_some() {
                    counts.failed += 1;
                }
                for child in children {
                    counts += child.counts();
                }
                counts
            }
        }
    }

    /// Whether anything in this subtree actually ran or failed.
    pub fn has_executed(&self) -> bool {
        match self {
            Self::Test(result) => result.status != TestStatus::Skipped,
            Self::Group {
                children, error, ..
            } => error.is_some() || children.iter().any(TestOutcome::has_executed),
        }
    }

    /// Visit every leaf and failed group with its path of names.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&[&'a str], &'a TestOutcome)) {
        fn go<'a>(
            node: &'a TestOutcome,
            path: &mut Vec<&'a str>,
            visit: &mut dyn FnMut(&[&'a str], &'a TestOutcome),
        ) {
            path.push(node.name());
            visit(path, node);
            if let TestOutcome::Group { children, .. } = node {
                for child in children {
                    go(child, path, visit);
                }
            }
            let _ = path.pop();
        }
        go(self, &mut Vec::new(), visit);
    }
}

/// Passed, failed and skipped test counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Counts {
    pub fn of(status: TestStatus) -> Self {
        let mut counts = Self::default();
        match status {
            TestStatus::Passed => counts.passed = 1,
            TestStatus::Failed => counts.failed = 1,
            TestStatus::Skipped => counts.skipped = 1,
        }
        counts
    }

    /// Every test considered, skipped ones included.
    pub fn run(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.run() == 0
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, other: Self) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}
