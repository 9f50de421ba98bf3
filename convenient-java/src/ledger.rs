//! Build ledger: what the previous build compiled, and from what
//!
//! On disk:
//!
//! ```json
//! {
//!   "javacVersion": "javac 21.0.2",
//!   "javaFiles": [{
//!     "path": "src/main/java/a/B.java",
//!     "lastModified": 1700000000000,
//!     "dependencies": ["src/main/java/a/C.java"],
//!     "classFiles": [{ "path": "build/classes/main/a/B.class", "lastModified": 1700000001000 }],
//!     "issues": []
//!   }]
//! }
//! ```

use crate::diagnostics::{Diagnostic, Severity};
use crate::layout::{ProjectLayout, SourceRole};
use crate::store::{self, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// A compiled output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledUnitRecord {
    /// Project-relative path of the `.class` file
    pub path: String,
    /// Modification time recorded when it was produced
    pub last_modified: i64,
}

/// What the ledger knows about one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceUnitRecord {
    /// Project-relative source path
    pub path: String,
    /// Source modification time at last successful processing
    pub last_modified: i64,
    /// Direct file-level dependencies
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    /// Outputs produced by the last compilation
    #[serde(rename = "classFiles", default)]
    pub compiled_units: Vec<CompiledUnitRecord>,
    /// Diagnostics from the last compilation
    #[serde(rename = "issues", default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl SourceUnitRecord {
    /// Whether the last compilation reported an error for this file.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// The persisted build record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLedger {
    /// `javac -version` banner of the compiler that produced the outputs
    #[serde(rename = "javacVersion")]
    pub compiler_version: String,
    /// One record per source file that existed at write time
    #[serde(rename = "javaFiles", default)]
    pub units: Vec<SourceUnitRecord>,
}

impl BuildLedger {
    /// Empty ledger for a compiler version.
    pub fn new(compiler_version: impl Into<String>) -> Self {
        Self {
            compiler_version: compiler_version.into(),
            units: Vec::new(),
        }
    }

    /// Load a ledger; `Ok(None)` when none has been written yet.
    pub fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        let ledger: Option<Self> = store::load_json(path)?;
        if let Some(ledger) = &ledger {
            debug!(
                "Loaded build ledger with {} record(s) from {}",
                ledger.units.len(),
                path.display()
            );
        }
        Ok(ledger)
    }

    /// Atomically replace the ledger at `path`.
    ///
    /// Records are written sorted by path so identical builds produce
    /// identical files.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let mut sorted = self.clone();
        sorted.sort();
        store::save_json(path, &sorted)
    }

    /// Sort records by path.
    pub fn sort(&mut self) {
        self.units.sort_by(|a, b| a.path.cmp(&b.path));
    }

    /// Look up the record of a source path.
    pub fn record(&self, path: &str) -> Option<&SourceUnitRecord> {
        self.units.iter().find(|r| r.path == path)
    }

    /// Records whose source lives under the root of `role`.
    pub fn records_with_role<'a>(
        &'a self,
        layout: &'a ProjectLayout,
        role: SourceRole,
    ) -> impl Iterator<Item = &'a SourceUnitRecord> + 'a {
        self.units
            .iter()
            .filter(move |r| layout.role_of(&r.path) == Some(role))
    }

    /// All diagnostics, in record order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.units.iter().flat_map(|r| r.diagnostics.iter())
    }

    /// Number of diagnostics with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics().filter(|d| d.severity == severity).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(path: &str) -> SourceUnitRecord {
        SourceUnitRecord {
            path: path.to_string(),
            last_modified: 1,
            dependencies: BTreeSet::new(),
            compiled_units: vec![],
            diagnostics: vec![],
        }
    }

    #[test]
    fn test_wire_format_field_names() {
        let mut ledger = BuildLedger::new("javac 21");
        let mut r = record("src/main/java/A.java");
        r.compiled_units.push(CompiledUnitRecord {
            path: "build/classes/main/A.class".into(),
            last_modified: 2,
        });
        ledger.units.push(r);

        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["javacVersion"], "javac 21");
        let file = &json["javaFiles"][0];
        assert_eq!(file["lastModified"], 1);
        assert_eq!(file["classFiles"][0]["path"], "build/classes/main/A.class");
        assert!(file["issues"].as_array().unwrap().is_empty());
        assert!(file["dependencies"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_save_sorts_records() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ledger.json");

        let mut ledger = BuildLedger::new("javac 21");
        ledger.units.push(record("src/main/java/Z.java"));
        ledger.units.push(record("src/main/java/A.java"));
        ledger.save(&path).unwrap();

        let loaded = BuildLedger::load(&path).unwrap().unwrap();
        assert_eq!(loaded.units[0].path, "src/main/java/A.java");
        assert_eq!(loaded.units[1].path, "src/main/java/Z.java");
    }

    #[test]
    fn test_records_with_role() {
        let layout = ProjectLayout::new("/p");
        let mut ledger = BuildLedger::new("javac 21");
        ledger.units.push(record("src/main/java/A.java"));
        ledger.units.push(record("src/test/java/ATest.java"));

        let tests: Vec<_> = ledger.records_with_role(&layout, SourceRole::Test).collect();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].path, "src/test/java/ATest.java");
    }
}
