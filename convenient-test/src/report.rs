//! Plain-text test report
//!
//! ```text
//! CartTest
//!   adds: Passed
//!   totals: Failed
//!     sums: Failed
//!     rounds: Skipped: flaky
//!
//! Skipped tests:
//!   1) CartTest > totals > rounds: flaky
//!
//! Failed tests:
//!   1) CartTest > totals
//!      price table missing
//!   2) CartTest > totals > sums
//!      expected 3, got 4
//!        at shop.CartTest.sums(CartTest.java:9)
//!
//! Tests Run: 4, Passed: 1, Failed: 2, Skipped: 1
//! ```

use crate::outcome::{Counts, Failure, TestOutcome, TestStatus};
use std::fmt::Write;

/// Qualified name separator
pub const PATH_SEPARATOR: &str = " > ";

/// Render the result trees, the skipped and failed lists and the tallies.
///
/// The second tally line only appears when cached results were used.
pub fn render(outcomes: &[TestOutcome], executed: Counts, cached: Option<Counts>) -> String {
    let mut out = String::new();

    for outcome in outcomes {
        render_node(&mut out, outcome, 0);
    }

    let mut skipped = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
        outcome.walk(&mut |path, node| match node {
            TestOutcome::Test(result) if result.status == TestStatus::Skipped => {
                skipped.push((path.join(PATH_SEPARATOR), result.skip_reason.clone()));
            }
            TestOutcome::Test(result) => {
                if let Some(failure) = &result.failure {
                    failed.push((path.join(PATH_SEPARATOR), failure.clone()));
                }
            }
            TestOutcome::Group {
                error: Some(failure),
                ..
            } => failed.push((path.join(PATH_SEPARATOR), failure.clone())),
            TestOutcome::Group { .. } => {}
        });
    }

    if !skipped.is_empty() {
        out.push_str("\nSkipped tests:\n");
        for (i, (name, reason)) in skipped.iter().enumerate() {
            match reason {
                Some(reason) => {
                    let _ = writeln!(out, "  {}) {}: {}", i + 1, name, reason);
                }
                None => {
                    let _ = writeln!(out, "  {}) {}", i + 1, name);
                }
            }
        }
    }

    if !failed.is_empty() {
        out.push_str("\nFailed tests:\n");
        for (i, (name, failure)) in failed.iter().enumerate() {
            let _ = writeln!(out, "  {}) {}", i + 1, name);
            render_failure(&mut out, failure);
        }
    }

    out.push('\n');
    out.push_str(&tally(executed));
    out.push('\n');
    if let Some(cached) = cached
        && !cached.is_empty()
    {
        out.push_str(&cached_tally(cached));
        out.push('\n');
    }
    out
}

/// `Tests Run: n, Passed: n, Failed: n, Skipped: n`
pub fn tally(counts: Counts) -> String {
    format!(
        "Tests Run: {}, Passed: {}, Failed: {}, Skipped: {}",
        counts.run(),
        counts.passed,
        counts.failed,
        counts.skipped
    )
}

/// `Unmodified Tests: n, Unmodified Passed Tests: n, ...`
pub fn cached_tally(counts: Counts) -> String {
    format!(
        "Unmodified Tests: {}, Unmodified Passed Tests: {}, Unmodified Failed Tests: {}, Unmodified Skipped Tests: {}",
        counts.run(),
        counts.passed,
        counts.failed,
        counts.skipped
    )
}

fn render_node(out: &mut String, node: &TestOutcome, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        TestOutcome::Test(result) => match (&result.status, &result.skip_reason) {
            (TestStatus::Skipped, Some(reason)) => {
                let _ = writeln!(out, "{indent}{}: Skipped: {reason}", result.name);
            }
            (status, _) => {
                let _ = writeln!(out, "{indent}{}: {status}", result.name);
            }
        },
        TestOutcome::Group {
            name,
            children,
            error,
        } => {
            if !node.has_executed() {
                return;
            }
            if error.is_some() {
                let _ = writeln!(out, "{indent}{name}: Failed");
            } else {
                let _ = writeln!(out, "{indent}{name}");
            }
            for child in children {
                render_node(out, child, depth + 1);
            }
        }
    }
}

fn render_failure(out: &mut String, failure: &Failure) {
    for line in failure.message.lines() {
        let _ = writeln!(out, "     {line}");
    }
    for cause in &failure.causes {
        let _ = writeln!(out, "     Caused by: {cause}");
    }
    for frame in &failure.stack_trace {
        let frame = frame.trim();
        if frame.starts_with("at ") {
            let _ = writeln!(out, "       {frame}");
        } else {
            let _ = writeln!(out, "       at {frame}");
        }
    }
}
