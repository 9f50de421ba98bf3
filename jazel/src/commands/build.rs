//! `jazel build`: incremental compilation

use super::Project;
use crate::error::{FAILURE_EXIT_CODE, Result};
use convenient_java::{BuildReport, Builder, ImportScanner, Javac, Severity};
use std::time::Instant;

/// Build the project and print what happened.
pub fn compile(project: &Project) -> Result<BuildReport> {
    let config = &project.config;
    let javac = Javac::new(config.toolchain()).with_options(config.compiler_options());
    let scanner = ImportScanner::new();

    println!("🔨 Building {}", project.root.display());
    let started = Instant::now();
    let report = Builder::new(&project.layout, &javac, &scanner)
        .with_libraries(config.classpath.clone())
        .build()?;

    if report.toolchain_changed {
        println!("  ♻️  Compiler changed, rebuilt everything");
    }
    if report.compiled.is_empty() {
        println!("  ✓ Up to date");
    } else {
        println!("  ✓ Compiled {} source file(s)", report.compiled.len());
    }
    for path in &report.deleted_outputs {
        println!("  🗑  Deleted {}", path);
    }

    for diagnostic in &report.diagnostics {
        match diagnostic.severity {
            Severity::Error => eprintln!("  ❌ {}", diagnostic),
            _ => println!("  ⚠️  {}", diagnostic),
        }
    }

    let elapsed = started.elapsed().as_millis();
    if report.has_errors() {
        println!(
            "\n❌ Build failed: {} error(s), {} warning(s) in {} ms\n",
            report.error_count(),
            report.warning_count(),
            elapsed
        );
    } else {
        println!(
            "\n✅ Build complete: {} warning(s) in {} ms\n",
            report.warning_count(),
            elapsed
        );
    }
    Ok(report)
}

pub fn run(project: &Project) -> Result<i32> {
    let report = compile(project)?;
    Ok(if report.has_errors() { FAILURE_EXIT_CODE } else { 0 })
}
