//! Incremental rebuild simulation over a file-level dependency graph
//!
//! Mirrors how a build uses the graph:
//! 1. Record the dependencies of every source file
//! 2. Change or delete a few files
//! 3. Ask which untouched files must be rebuilt as a consequence

use convenient_graph::DependencyGraph;
use std::collections::BTreeSet;

fn project() -> DependencyGraph<String> {
    let mut graph = DependencyGraph::new();
    let edges: [(&str, &[&str]); 6] = [
        ("app/Main.java", &["app/Service.java", "util/Strings.java"]),
        ("app/Service.java", &["model/User.java", "model/Repo.java"]),
        ("model/User.java", &["model/Repo.java"]),
        // User <-> Repo reference each other
        ("model/Repo.java", &["model/User.java"]),
        ("util/Strings.java", &[]),
        ("util/Dates.java", &[]),
    ];
    for (node, deps) in edges {
        graph.record(node.to_string(), deps.iter().map(|d| (*d).to_string()));
    }
    graph
}

fn names(set: &BTreeSet<String>) -> Vec<&str> {
    set.iter().map(String::as_str).collect()
}

#[test]
fn test_leaf_change_invalidates_chain() {
    let graph = project();

    let affected = graph.dependents_closure(["util/Strings.java".to_string()]);
    assert_eq!(names(&affected), vec!["app/Main.java"]);
}

#[test]
fn test_cyclic_change_invalidates_both_sides() {
    let graph = project();

    let affected = graph.dependents_closure(["model/Repo.java".to_string()]);
    assert_eq!(
        names(&affected),
        vec![
            "app/Main.java",
            "app/Service.java",
            "model/Repo.java",
            "model/User.java",
        ]
    );
    assert!(!affected.contains("util/Dates.java"));
}

#[test]
fn test_deleted_file_invalidates_dependents() {
    let mut graph = project();

    // Dependents are computed before the node is dropped from the graph.
    let affected = graph.dependents_closure(["util/Strings.java".to_string()]);
    let direct = graph.remove(&"util/Strings.java".to_string());

    assert_eq!(names(&direct), vec!["app/Main.java"]);
    assert_eq!(affected, direct);
    assert!(
        !graph
            .dependencies(&"app/Main.java".to_string())
            .unwrap()
            .contains("util/Strings.java")
    );
}

#[test]
fn test_unrelated_change_touches_nothing() {
    let graph = project();

    let affected = graph.dependents_closure(["util/Dates.java".to_string()]);
    assert!(affected.is_empty());
}

#[test]
fn test_cycle_report() {
    let graph = project();

    let cycles = graph.find_cycles();
    assert_eq!(cycles.len(), 1);
    let members: BTreeSet<_> = cycles[0].iter().map(String::as_str).collect();
    assert!(members.contains("model/User.java"));
    assert!(members.contains("model/Repo.java"));
}

#[cfg(feature = "serde")]
#[test]
fn test_serde_round_trip() {
    let graph = project();
    let json = serde_json::to_string(&graph).unwrap();
    let restored: DependencyGraph<String> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.edge_count(), graph.edge_count());
}
