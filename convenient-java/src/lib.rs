//! Incremental `javac` orchestration for a single project.
//!
//! The crate answers, on every invocation, "which `.java` files must be
//! recompiled?", runs the compiler for exactly those, and records the result
//! in a build ledger so the next invocation can reuse prior work.
//!
//! ## Architecture
//!
//! 1. **Inventory** ([`inventory`]): walk the main and test source roots
//! 2. **Ledger** ([`ledger`]): load the previous build record, if any
//! 3. **Resolution** ([`resolver`]): new/modified detection, dependency
//!    re-extraction ([`deps`]), cascading invalidation over the file graph,
//!    stale output detection
//! 4. **Compilation** ([`compiler`]): one `javac` invocation per source root,
//!    diagnostics parsing ([`diagnostics`]), output mapping
//! 5. **Persistence**: the ledger is replaced wholesale via an atomic rename
//!
//! [`Builder`] runs the whole pipeline.
//!
//! ## Usage
//!
//! ```no_run
//! use convenient_java::{Builder, ImportScanner, Javac, JavaToolchain, ProjectLayout};
//!
//! # fn example() -> convenient_java::Result<()> {
//! let layout = ProjectLayout::new("/path/to/project");
//! let javac = Javac::new(JavaToolchain::default());
//! let report = Builder::new(&layout, &javac, &ImportScanner::new()).build()?;
//! println!("compiled {} file(s)", report.compiled.len());
//! # Ok(())
//! # }
//! ```

pub mod build;
pub mod compiler;
pub mod deps;
pub mod diagnostics;
pub mod error;
pub mod inventory;
pub mod layout;
pub mod ledger;
pub mod resolver;
pub mod store;
pub mod timestamp;
pub mod toolchain;

pub use build::{BuildReport, Builder};
pub use compiler::{
    CompilationOrchestrator, CompileOutcome, CompileRequest, CompilerBackend, CompilerOptions,
    Javac,
};
pub use deps::{DependencyExtractor, ImportScanner, SourceIndex};
pub use diagnostics::{Diagnostic, JavacOutputParser, ParsedDiagnostics, Severity};
pub use error::{BuildError, Result};
pub use inventory::SourceUnit;
pub use layout::{ProjectLayout, SourceRole};
pub use ledger::{BuildLedger, CompiledUnitRecord, SourceUnitRecord};
pub use resolver::{BuildPlan, PlannedUnit, StaleReason, StalenessResolver};
pub use store::StoreError;
pub use toolchain::{JavaToolchain, ProcessOutput};
