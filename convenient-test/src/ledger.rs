//! Test ledger: cached results per compiled test class
//!
//! ```json
//! {
//!   "javaVersion": "openjdk version \"21.0.2\" 2024-01-16",
//!   "classFiles": [{
//!     "path": "build/classes/test/shop/CartTest.class",
//!     "lastModified": 1700000001000,
//!     "passedTestCount": 3,
//!     "skippedTestCount": 0,
//!     "failedTestCount": 1
//!   }]
//! }
//! ```

use crate::outcome::Counts;
use convenient_java::StoreError;
use convenient_java::store;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of the last execution of one test class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestClassRecord {
    pub path: String,
    /// Class file modification time when it was executed
    pub last_modified: i64,
    #[serde(rename = "passedTestCount")]
    pub passed: usize,
    #[serde(rename = "skippedTestCount")]
    pub skipped: usize,
    #[serde(rename = "failedTestCount")]
    pub failed: usize,
}

impl TestClassRecord {
    pub fn new(path: impl Into<String>, last_modified: i64, counts: Counts) -> Self {
        Self {
            path: path.into(),
            last_modified,
            passed: counts.passed,
            skipped: counts.skipped,
            failed: counts.failed,
        }
    }

    pub fn counts(&self) -> Counts {
        Counts {
            passed: self.passed,
            failed: self.failed,
            skipped: self.skipped,
        }
    }
}

/// The persisted test record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestLedger {
    /// Version banner of the runtime the results were produced with
    #[serde(rename = "javaVersion")]
    pub runtime_version: String,
    #[serde(rename = "classFiles", default)]
    pub classes: Vec<TestClassRecord>,
}

impl TestLedger {
    pub fn new(runtime_version: impl Into<String>) -> Self {
        Self {
            runtime_version: runtime_version.into(),
            classes: Vec::new(),
        }
    }

    /// `Ok(None)` when no ledger has been written yet.
    pub fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        store::load_json(path)
    }

    /// Atomically replace the ledger at `path`, records sorted by path.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let mut sorted = self.clone();
        sorted.classes.sort_by(|a, b| a.path.cmp(&b.path));
        store::save_json(path, &sorted)
    }

    pub fn record(&self, path: &str) -> Option<&TestClassRecord> {
        self.classes.iter().find(|r| r.path == path)
    }
}
