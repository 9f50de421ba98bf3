//! Build driver: inventory, resolution, compilation, ledger write

use crate::compiler::{CompilationOrchestrator, CompilerBackend};
use crate::deps::DependencyExtractor;
use crate::diagnostics::{Diagnostic, Severity};
use crate::error::Result;
use crate::inventory;
use crate::layout::ProjectLayout;
use crate::ledger::BuildLedger;
use crate::resolver::StalenessResolver;
use crate::timestamp::now_millis;
use std::path::PathBuf;
use tracing::{debug, info};

/// What a build did
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Ledger describing the project after the build
    pub ledger: BuildLedger,
    /// Sources handed to the compiler, in compile order
    pub compiled: Vec<String>,
    /// Orphaned class files removed from disk
    pub deleted_outputs: Vec<String>,
    /// Diagnostics reported by this build's compiler runs
    pub diagnostics: Vec<Diagnostic>,
    /// Whether the ledger file was rewritten
    pub ledger_written: bool,
    /// Whether the compiler version differed from the ledger's
    pub toolchain_changed: bool,
    /// Milliseconds since the epoch when the build started
    pub build_start: i64,
}

impl BuildReport {
    /// Error diagnostics known after this build, including carried ones.
    pub fn error_count(&self) -> usize {
        self.ledger.count(Severity::Error)
    }

    /// Warning diagnostics known after this build, including carried ones.
    pub fn warning_count(&self) -> usize {
        self.ledger.count(Severity::Warning)
    }

    /// Whether any source currently has compile errors.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// Runs one incremental build of a project
pub struct Builder<'a> {
    layout: &'a ProjectLayout,
    backend: &'a dyn CompilerBackend,
    extractor: &'a dyn DependencyExtractor,
    libraries: Vec<PathBuf>,
}

impl<'a> Builder<'a> {
    pub fn new(
        layout: &'a ProjectLayout,
        backend: &'a dyn CompilerBackend,
        extractor: &'a dyn DependencyExtractor,
    ) -> Self {
        Self {
            layout,
            backend,
            extractor,
            libraries: Vec::new(),
        }
    }

    /// Libraries placed on both compile classpaths.
    #[must_use]
    pub fn with_libraries(mut self, libraries: Vec<PathBuf>) -> Self {
        self.libraries = libraries;
        self
    }

    /// Build the project.
    ///
    /// The ledger is rewritten only if something was compiled or deleted,
    /// no ledger existed, or the compiler changed. On error the previous
    /// ledger is left as it was.
    pub fn build(&self) -> Result<BuildReport> {
        let build_start = now_millis();
        let ledger_path = self.layout.build_ledger_path();

        let units = inventory::scan(self.layout)?;
        let previous = BuildLedger::load(&ledger_path)?;
        if previous.is_none() {
            debug!("No build ledger at {}", ledger_path.display());
        }
        let compiler_version = self.backend.version()?;

        let plan = StalenessResolver::new(self.layout, self.extractor).resolve(
            &units,
            previous.as_ref(),
            &compiler_version,
        )?;

        if plan.compile.is_empty() {
            info!("No .java files need to be compiled");
        }

        let outcome = CompilationOrchestrator::new(self.layout, self.backend)
            .with_libraries(self.libraries.clone())
            .execute(&plan, build_start)?;

        let ledger_written = plan.needs_ledger_write();
        if ledger_written {
            outcome.ledger.save(&ledger_path)?;
            debug!("Wrote build ledger to {}", ledger_path.display());
        }

        for path in &outcome.deleted_outputs {
            info!("Deleted {}", path);
        }

        Ok(BuildReport {
            ledger: outcome.ledger,
            compiled: outcome.compiled,
            deleted_outputs: outcome.deleted_outputs,
            diagnostics: outcome.diagnostics.diagnostics,
            ledger_written,
            toolchain_changed: plan.toolchain_changed,
            build_start,
        })
    }
}
