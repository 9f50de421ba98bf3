//! Cycle-tolerant dependency graph for incremental builds.
//!
//! Source files reference each other freely, so unlike a task DAG the
//! file-level dependency graph may contain cycles (`A` uses `B`, `B` uses `A`).
//! This crate keeps forward (node → dependencies) and reverse
//! (dependency → dependents) mappings and answers the one question an
//! incremental build keeps asking: *which nodes are affected when these nodes
//! change?*
//!
//! # Features
//!
//! - Generic node keys (`Ord + Clone`), deterministic iteration order
//! - Edges may point at nodes that are not (or no longer) recorded
//! - Cycle-safe transitive dependents closure
//! - Cycle reporting for diagnostics
//! - Optional serde support
//!
//! # Example
//!
//! ```
//! use convenient_graph::DependencyGraph;
//!
//! let mut graph = DependencyGraph::<&str>::new();
//! graph.record("a", ["b"]);
//! graph.record("b", ["c"]);
//! graph.record("c", ["a"]); // cycles are fine
//! graph.record("d", []);
//!
//! let affected = graph.dependents_closure(["c"]);
//! assert!(affected.contains("a"));
//! assert!(affected.contains("b"));
//! assert!(!affected.contains("d"));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Error types for graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node {0} not found in graph")]
    NodeNotFound(String),
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Directed dependency graph keyed by `K`.
///
/// An edge `from -> to` means `from` depends on `to`. Recording a node
/// replaces its previous outgoing edges, keeping both mappings consistent.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DependencyGraph<K: Ord> {
    /// Forward: node -> what it depends on
    forward: BTreeMap<K, BTreeSet<K>>,
    /// Reverse: node -> who depends on it
    reverse: BTreeMap<K, BTreeSet<K>>,
}

impl<K: Ord> Default for DependencyGraph<K> {
    fn default() -> Self {
        Self {
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
        }
    }
}

impl<K> DependencyGraph<K>
where
    K: Ord + Clone + Debug,
{
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the direct dependencies of `node`, replacing earlier ones.
    ///
    /// Self-references are dropped.
    pub fn record<I>(&mut self, node: K, dependencies: I)
    where
        I: IntoIterator<Item = K>,
    {
        self.unlink(&node);

        let deps: BTreeSet<K> = dependencies.into_iter().filter(|d| *d != node).collect();
        for dep in &deps {
            let _ = self
                .reverse
                .entry(dep.clone())
                .or_default()
                .insert(node.clone());
        }
        let _ = self.forward.insert(node, deps);
    }

    /// Remove `node` entirely: its own edges and every edge pointing at it.
    ///
    /// Returns the nodes that depended on it.
    pub fn remove(&mut self, node: &K) -> BTreeSet<K> {
        self.unlink(node);
        let _ = self.forward.remove(node);

        let dependents = self.reverse.remove(node).unwrap_or_default();
        for dependent in &dependents {
            if let Some(deps) = self.forward.get_mut(dependent) {
                let _ = deps.remove(node);
            }
        }
        dependents
    }

    /// Whether `node` has been recorded.
    #[must_use]
    pub fn contains(&self, node: &K) -> bool {
        self.forward.contains_key(node)
    }

    /// Direct dependencies of a recorded node.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node was never recorded.
    pub fn dependencies(&self, node: &K) -> GraphResult<&BTreeSet<K>> {
        self.forward
            .get(node)
            .ok_or_else(|| GraphError::NodeNotFound(format!("{node:?}")))
    }

    /// Direct dependents of `node`. Unknown nodes have none.
    pub fn dependents(&self, node: &K) -> impl Iterator<Item = &K> {
        self.reverse.get(node).into_iter().flatten()
    }

    /// Get the number of recorded nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.forward.len()
    }

    /// Get the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    /// Every node that transitively depends on any of `seeds`.
    ///
    /// Seeds themselves are only part of the result when they are reached
    /// through a cycle. Traversal is breadth-first with a visited set, so
    /// cyclic graphs terminate.
    pub fn dependents_closure<I>(&self, seeds: I) -> BTreeSet<K>
    where
        I: IntoIterator<Item = K>,
    {
        let mut reached = BTreeSet::new();
        let mut queue: VecDeque<K> = seeds.into_iter().collect();
        let mut expanded: BTreeSet<K> = BTreeSet::new();

        while let Some(current) = queue.pop_front() {
            if !expanded.insert(current.clone()) {
                continue;
            }
            for dependent in self.dependents(&current) {
                let _ = reached.insert(dependent.clone());
                if !expanded.contains(dependent) {
                    queue.push_back(dependent.clone());
                }
            }
        }

        reached
    }

    /// Find the cycles reachable through recorded edges.
    ///
    /// Each cycle is reported once, starting from the node where the
    /// depth-first search first re-entered it.
    #[must_use]
    pub fn find_cycles(&self) -> Vec<Vec<K>> {
        let mut cycles = Vec::new();
        let mut visited = BTreeSet::new();
        let mut on_stack = BTreeSet::new();
        let mut path = Vec::new();

        for node in self.forward.keys() {
            if !visited.contains(node) {
                self.find_cycles_dfs(node, &mut visited, &mut on_stack, &mut path, &mut cycles);
            }
        }

        cycles
    }

    fn find_cycles_dfs(
        &self,
        node: &K,
        visited: &mut BTreeSet<K>,
        on_stack: &mut BTreeSet<K>,
        path: &mut Vec<K>,
        cycles: &mut Vec<Vec<K>>,
    ) {
        let _ = visited.insert(node.clone());
        let _ = on_stack.insert(node.clone());
        path.push(node.clone());

        if let Some(deps) = self.forward.get(node) {
            for dep in deps {
                if !visited.contains(dep) {
                    self.find_cycles_dfs(dep, visited, on_stack, path, cycles);
                } else if on_stack.contains(dep)
                    && let Some(start) = path.iter().position(|n| n == dep)
                {
                    cycles.push(path[start..].to_vec());
                }
            }
        }

        let _ = path.pop();
        let _ = on_stack.remove(node);
    }

    fn unlink(&mut self, node: &K) {
        let Some(old_deps) = self.forward.get(node) else {
            return;
        };

        for dep in old_deps {
            if let Some(dependents) = self.reverse.get_mut(dep) {
                let _ = dependents.remove(node);
                if dependents.is_empty() {
                    let _ = self.reverse.remove(dep);
                }
            }
        }
        if let Some(deps) = self.forward.get_mut(node) {
            deps.clear();
        }
    }
}
