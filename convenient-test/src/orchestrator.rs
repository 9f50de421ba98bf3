//! Test phase: which compiled test classes run, running them, caching results

use crate::collector::TestRunner;
use crate::container::{ContainerLoader, TestUnit};
use crate::error::{Result, TestError};
use crate::ledger::{TestClassRecord, TestLedger};
use crate::outcome::{Counts, TestOutcome};
use crate::report;
use convenient_java::timestamp::modified_millis;
use convenient_java::{BuildLedger, ProjectLayout, SourceRole};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Process exit status of a test command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// No failures, or no tests
    Success,
    /// At least one test failed, in this run or in cached results
    TestsFailed,
    /// Nothing could run because of a configuration problem
    ConfigurationError,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::TestsFailed => 2,
            Self::ConfigurationError => -1,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Compiled test classes of the build: the top-level class files owned by
/// test sources. Classes missing on disk are skipped.
pub fn discover_units(layout: &ProjectLayout, ledger: &BuildLedger) -> Vec<TestUnit> {
    let classes_dir = convenient_java::layout::to_slash(&layout.classes_dir(SourceRole::Test));
    let mut units = Vec::new();

    for record in ledger.records_with_role(layout, SourceRole::Test) {
        for compiled in &record.compiled_units {
            let Some(stem) = compiled
                .path
                .strip_prefix(&classes_dir)
                .map(|rest| rest.trim_start_matches('/'))
                .and_then(|rest| rest.strip_suffix(".class"))
            else {
                continue;
            };
            if stem.contains('$') {
                continue;
            }
            let last_modified = match modified_millis(&layout.absolute(&compiled.path)) {
                Ok(mtime) => mtime,
                Err(e) => {
                    warn!("Skipping {}: {}", compiled.path, e);
                    continue;
                }
            };
            units.push(TestUnit {
                path: compiled.path.clone(),
                class_name: stem.replace('/', "."),
                source: record.path.clone(),
                last_modified,
            });
        }
    }

    units.sort_by(|a, b| a.path.cmp(&b.path));
    units
}

/// What a test phase did
#[derive(Debug, Clone)]
pub struct TestRun {
    /// Result trees of executed containers, in unit order
    pub outcomes: Vec<TestOutcome>,
    /// Totals of this run
    pub executed: Counts,
    /// Totals served from the ledger
    pub cached: Counts,
    /// Number of test classes served from the ledger
    pub cached_units: usize,
    /// Classes that could not be loaded, with the reason
    pub load_failures: Vec<(String, String)>,
    /// Ledger after this run
    pub ledger: TestLedger,
    pub ledger_written: bool,
}

impl TestRun {
    pub fn exit_status(&self) -> ExitStatus {
        if self.executed.failed > 0 || self.cached.failed > 0 {
            ExitStatus::TestsFailed
        } else {
            ExitStatus::Success
        }
    }

    /// The textual report.
    pub fn report(&self) -> String {
        let cached = (self.cached_units > 0).then_some(self.cached);
        report::render(&self.outcomes, self.executed, cached)
    }
}

/// Decides, runs and records the test phase
pub struct TestOrchestrator<'a> {
    layout: &'a ProjectLayout,
    loader: &'a dyn ContainerLoader,
    runner: &'a TestRunner,
    runtime_version: String,
    cache: bool,
}

impl<'a> TestOrchestrator<'a> {
    pub fn new(
        layout: &'a ProjectLayout,
        loader: &'a dyn ContainerLoader,
        runner: &'a TestRunner,
        runtime_version: impl Into<String>,
    ) -> Self {
        Self {
            layout,
            loader,
            runner,
            runtime_version: runtime_version.into(),
            cache: true,
        }
    }

    /// Enable or disable result caching.
    #[must_use]
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Run the test phase against the post-build ledger.
    pub fn run(&self, build: &BuildLedger) -> Result<TestRun> {
        if build.units.is_empty() {
            return Err(TestError::NoSourceUnits(self.layout.root().display().to_string()));
        }

        let ledger_path = self.layout.test_ledger_path();
        let previous = self.load_previous(&ledger_path)?;
        let units = discover_units(self.layout, build);
        debug!("Found {} compiled test class(es)", units.len());

        let mut run = TestRun {
            outcomes: Vec::new(),
            executed: Counts::default(),
            cached: Counts::default(),
            cached_units: 0,
            load_failures: Vec::new(),
            ledger: TestLedger::new(self.runtime_version.clone()),
            ledger_written: false,
        };

        for unit in &units {
            if let Some(record) = previous.as_ref().and_then(|l| self.cached_record(l, unit, build)) {
                debug!("{} is unmodified", unit.class_name);
                run.cached += record.counts();
                run.cached_units += 1;
                run.ledger.classes.push(record.clone());
                continue;
            }

            let container = match self.loader.load(unit) {
                Ok(container) => container,
                Err(TestError::Load { class, reason }) => {
                    warn!("Could not load {}: {}", class, reason);
                    run.load_failures.push((class, reason));
                    continue;
                }
                Err(e) => return Err(e),
            };

            info!("Running {}", unit.class_name);
            let outcome = self.runner.run(container.as_ref());
            let counts = outcome.counts();
            run.executed += counts;
            run.ledger
                .classes
                .push(TestClassRecord::new(unit.path.clone(), unit.last_modified, counts));
            run.outcomes.push(outcome);
        }

        if self.cache {
            run.ledger.save(&ledger_path)?;
            run.ledger_written = true;
        }
        Ok(run)
    }

    fn load_previous(&self, path: &Path) -> Result<Option<TestLedger>> {
        if !self.cache {
            info!("Test result caching is disabled, running every test class");
            return Ok(None);
        }
        let Some(ledger) = TestLedger::load(path)? else {
            info!("No test-result file found, running every test class");
            return Ok(None);
        };
        if ledger.runtime_version != self.runtime_version {
            info!(
                "The installed runtime has changed ({} -> {}), running every test class",
                ledger.runtime_version, self.runtime_version
            );
            return Ok(None);
        }
        Ok(Some(ledger))
    }

    /// The cached result of `unit`, if it may be reused.
    fn cached_record<'l>(
        &self,
        ledger: &'l TestLedger,
        unit: &TestUnit,
        build: &BuildLedger,
    ) -> Option<&'l TestClassRecord> {
        let record = ledger.record(&unit.path)?;
        if record.last_modified != unit.last_modified {
            return None;
        }
        if build.record(&unit.source).is_some_and(|r| r.has_errors()) {
            return None;
        }
        Some(record)
    }
}
