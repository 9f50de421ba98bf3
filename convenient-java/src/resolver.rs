//! Staleness resolution: which source units must be (re)compiled
//!
//! The resolver compares the current inventory with the previous
//! [`BuildLedger`] and produces a [`BuildPlan`]:
//!
//! 1. A missing ledger or a changed compiler version marks every unit
//! 2. Records with no source on disk are deletions; their outputs are orphaned
//! 3. New units and units with a changed timestamp are marked
//! 4. Marked units get their dependencies re-extracted
//! 5. Dependents of deleted and marked units are marked, transitively
//! 6. Unmarked units with missing, outdated or absent outputs, or with
//!    recorded errors, are marked
//! 7. Everything else is carried forward verbatim
//!
//! A unit, once marked, stays marked.

use crate::deps::{DependencyExtractor, SourceIndex};
use crate::error::Result;
use crate::inventory::SourceUnit;
use crate::layout::ProjectLayout;
use crate::ledger::{BuildLedger, CompiledUnitRecord, SourceUnitRecord};
use crate::timestamp::modified_millis;
use convenient_graph::DependencyGraph;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

/// Why a unit is in the compile set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// No previous record
    New,
    /// Source timestamp differs from the record
    Modified,
    /// No ledger, or a different compiler produced it
    ToolchainChanged,
    /// Depends, possibly transitively, on a changed or deleted unit
    DependencyChanged,
    /// The record lists no compiled output
    NoCompiledUnits,
    /// A recorded output is gone
    MissingCompiledUnit(String),
    /// A recorded output was touched since it was produced
    OutdatedCompiledUnit(String),
    /// The last compilation reported errors
    CarriedErrors,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Modified => write!(f, "modified"),
            Self::ToolchainChanged => write!(f, "toolchain changed"),
            Self::DependencyChanged => write!(f, "dependency changed"),
            Self::NoCompiledUnits => write!(f, "no compiled output"),
            Self::MissingCompiledUnit(path) => write!(f, "missing {path}"),
            Self::OutdatedCompiledUnit(path) => write!(f, "outdated {path}"),
            Self::CarriedErrors => write!(f, "previous errors"),
        }
    }
}

/// A unit scheduled for compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUnit {
    pub unit: SourceUnit,
    pub reason: StaleReason,
}

/// Result of staleness resolution
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// Version of the compiler the plan was made for
    pub compiler_version: String,
    /// Units to compile, in inventory order
    pub compile: Vec<PlannedUnit>,
    /// Records whose source no longer exists
    pub deleted: Vec<SourceUnitRecord>,
    /// Up-to-date records, copied forward verbatim
    pub carried: Vec<SourceUnitRecord>,
    /// Previous records of the units in the compile set
    pub previous: BTreeMap<String, SourceUnitRecord>,
    /// Fresh dependency sets of the units in the compile set
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
    /// The ledger was missing or written by another compiler
    pub toolchain_changed: bool,
    /// No ledger existed
    pub fresh: bool,
}

impl BuildPlan {
    /// Nothing to compile and nothing was deleted.
    pub fn is_noop(&self) -> bool {
        self.compile.is_empty() && self.deleted.is_empty()
    }

    /// Outputs of deleted units, to be removed from disk.
    pub fn orphaned_outputs(&self) -> impl Iterator<Item = &CompiledUnitRecord> {
        self.deleted.iter().flat_map(|r| r.compiled_units.iter())
    }

    /// Whether the ledger must be rewritten after this build.
    pub fn needs_ledger_write(&self) -> bool {
        self.fresh || self.toolchain_changed || !self.is_noop()
    }
}

/// Computes a [`BuildPlan`]
pub struct StalenessResolver<'a> {
    layout: &'a ProjectLayout,
    extractor: &'a dyn DependencyExtractor,
}

impl<'a> StalenessResolver<'a> {
    pub fn new(layout: &'a ProjectLayout, extractor: &'a dyn DependencyExtractor) -> Self {
        Self { layout, extractor }
    }

    /// Resolve the compile set for `inventory`.
    pub fn resolve(
        &self,
        inventory: &[SourceUnit],
        previous: Option<&BuildLedger>,
        compiler_version: &str,
    ) -> Result<BuildPlan> {
        let fresh = previous.is_none();
        let toolchain_changed = previous.is_none_or(|l| l.compiler_version != compiler_version);
        if let Some(ledger) = previous
            && toolchain_changed
        {
            info!(
                "The installed toolchain has changed ({} -> {}), revalidating every source file",
                ledger.compiler_version, compiler_version
            );
        }

        let mut records: BTreeMap<String, SourceUnitRecord> = previous
            .map(|l| l.units.iter().map(|r| (r.path.clone(), r.clone())).collect())
            .unwrap_or_default();
        let current: BTreeSet<&str> = inventory.iter().map(|u| u.path.as_str()).collect();

        let mut graph: DependencyGraph<String> = DependencyGraph::new();
        for record in records.values() {
            graph.record(record.path.clone(), record.dependencies.iter().cloned());
        }

        // deletions
        let deleted_paths: Vec<String> = records
            .keys()
            .filter(|path| !current.contains(path.as_str()))
            .cloned()
            .collect();
        let deleted: Vec<SourceUnitRecord> = deleted_paths
            .iter()
            .filter_map(|path| records.remove(path))
            .collect();
        for record in &deleted {
            debug!("{} was deleted", record.path);
        }

        // new, modified, toolchain
        let mut marked: BTreeMap<String, StaleReason> = BTreeMap::new();
        for unit in inventory {
            let reason = match records.get(&unit.path) {
                None => Some(StaleReason::New),
                Some(_) if toolchain_changed => Some(StaleReason::ToolchainChanged),
                Some(record) if record.last_modified != unit.last_modified => {
                    Some(StaleReason::Modified)
                }
                Some(_) => None,
            };
            if let Some(reason) = reason {
                let _ = marked.insert(unit.path.clone(), reason);
            }
        }

        // fresh edges before cascading
        let index = SourceIndex::new(self.layout, inventory);
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for unit in inventory.iter().filter(|u| marked.contains_key(&u.path)) {
            let deps = self.extractor.extract(self.layout, unit, &index)?;
            graph.record(unit.path.clone(), deps.iter().cloned());
            let _ = dependencies.insert(unit.path.clone(), deps);
        }

        // cascade
        let seeds = deleted_paths.iter().chain(marked.keys()).cloned();
        for path in graph.dependents_closure(seeds) {
            if current.contains(path.as_str()) && !marked.contains_key(&path) {
                debug!("{} depends on a changed file", path);
                let _ = marked.insert(path, StaleReason::DependencyChanged);
            }
        }
        for path in &deleted_paths {
            let _ = graph.remove(path);
        }
        for cycle in graph.find_cycles() {
            debug!("Dependency cycle: {}", cycle.join(" -> "));
        }

        // stale outputs
        for unit in inventory {
            if marked.contains_key(&unit.path) {
                continue;
            }
            if let Some(record) = records.get(&unit.path)
                && let Some(reason) = self.stale_output(record)
            {
                debug!("{} is stale: {}", unit.path, reason);
                let _ = marked.insert(unit.path.clone(), reason);
            }
        }

        // cascaded and stale-output units are recompiled too
        for unit in inventory {
            if marked.contains_key(&unit.path) && !dependencies.contains_key(&unit.path) {
                let deps = self.extractor.extract(self.layout, unit, &index)?;
                let _ = dependencies.insert(unit.path.clone(), deps);
            }
        }

        let mut compile = Vec::new();
        let mut carried = Vec::new();
        let mut previous_records = BTreeMap::new();
        for unit in inventory {
            let record = records.remove(&unit.path);
            match marked.remove(&unit.path) {
                Some(reason) => {
                    if let Some(record) = record {
                        let _ = previous_records.insert(unit.path.clone(), record);
                    }
                    compile.push(PlannedUnit {
                        unit: unit.clone(),
                        reason,
                    });
                }
                None => {
                    if let Some(mut record) = record {
                        for path in &deleted_paths {
                            let _ = record.dependencies.remove(path);
                        }
                        carried.push(record);
                    }
                }
            }
        }

        debug!(
            "Resolved {} to compile, {} deleted, {} up to date",
            compile.len(),
            deleted.len(),
            carried.len()
        );

        Ok(BuildPlan {
            compiler_version: compiler_version.to_string(),
            compile,
            deleted,
            carried,
            previous: previous_records,
            dependencies,
            toolchain_changed,
            fresh,
        })
    }

    fn stale_output(&self, record: &SourceUnitRecord) -> Option<StaleReason> {
        if record.compiled_units.is_empty() && !may_compile_to_nothing(&record.path) {
            return Some(StaleReason::NoCompiledUnits);
        }
        for compiled in &record.compiled_units {
            match modified_millis(&self.layout.absolute(&compiled.path)) {
                Err(_) => return Some(StaleReason::MissingCompiledUnit(compiled.path.clone())),
                Ok(mtime) if mtime != compiled.last_modified => {
                    return Some(StaleReason::OutdatedCompiledUnit(compiled.path.clone()));
                }
                Ok(_) => {}
            }
        }
        if record.has_errors() {
            return Some(StaleReason::CarriedErrors);
        }
        None
    }
}

/// `package-info.java` without annotations and `module-info.java` under
/// some compiler options produce no class file.
fn may_compile_to_nothing(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    matches!(name, "package-info.java" | "module-info.java")
}
