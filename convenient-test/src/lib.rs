//! Cached execution of compiled Java test classes.
//!
//! After a build, every top-level class compiled from the test sources is a
//! test unit. A unit runs again only when its class file changed, its source
//! has compile errors, the runtime changed, or caching is off; otherwise its
//! previous counts are reused from the test ledger.
//!
//! ## Architecture
//!
//! - [`container`]: the [`TestContainer`] trait, a name → container
//!   [`ContainerRegistry`], and the [`ContainerLoader`] seam
//! - [`collector`]: registration API and the worker-pool [`TestRunner`]
//! - [`runtime`]: JVM launcher and its JSON event stream
//! - [`orchestrator`]: staleness decision, execution, ledger update
//! - [`report`]: tree, skipped/failed lists, tallies
//! - [`coverage`]: coverage agent and report commands

pub mod collector;
pub mod container;
pub mod coverage;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod outcome;
pub mod report;
pub mod runtime;

pub use collector::{Check, Collector, GroupError, Registration, TestRunner, ensure, ensure_eq};
pub use container::{ContainerLoader, ContainerRegistry, TestContainer, TestUnit};
pub use coverage::{CoverageMode, CoveragePaths};
pub use error::{Result, TestError};
pub use ledger::{TestClassRecord, TestLedger};
pub use orchestrator::{ExitStatus, TestOrchestrator, TestRun, discover_units};
pub use outcome::{Counts, Failure, FrameFilter, TestOutcome, TestResult, TestStatus};
pub use runtime::{RuntimeEvent, RuntimeLoader, RuntimeSettings, StreamContainer};
