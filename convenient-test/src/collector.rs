//! Test registration and execution
//!
//! A container registers its tests against a [`Collector`]:
//!
//! ```
//! use convenient_test::{Collector, Failure};
//!
//! let mut c = Collector::new();
//! c.test("adds items", || Ok(()));
//! c.group("totals", |c| {
//!     c.test("sums", || Err(Failure::assertion("expected 3, got 4")));
//!     c.test("rounds", || Ok(())).skip_because("flaky on CI");
//!     Ok(())
//! });
//! ```
//!
//! Group bodies run at registration time and only register children; test
//! bodies run later on the [`TestRunner`]'s worker pool. Each top-level
//! branch runs sequentially on one worker and reports back over a channel;
//! results are reassembled in declaration order.

use crate::container::TestContainer;
use crate::error::Result;
use crate::outcome::{Failure, FrameFilter, TestOutcome, TestResult, TestStatus};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use tracing::debug;

/// Outcome of a test body
pub type Check = std::result::Result<(), Failure>;

/// Error a group body may return to abort its own registration
pub type GroupError = Box<dyn std::error::Error + Send + Sync>;

type TestBody = Box<dyn FnOnce() -> Check + Send>;

/// Fail with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> Check {
    if condition {
        Ok(())
    } else {
        Err(Failure::assertion(message))
    }
}

/// Fail unless `actual == expected`.
pub fn ensure_eq<T: PartialEq + std::fmt::Debug>(actual: T, expected: T) -> Check {
    if actual == expected {
        Ok(())
    } else {
        Err(Failure::assertion(format!(
            "expected {expected:?}, got {actual:?}"
        )))
    }
}

#[derive(Debug, Clone, Default)]
struct Skip {
    reason: Option<String>,
}

enum Pending {
    Test {
        name: String,
        skip: Option<Skip>,
        body: TestBody,
    },
    Group {
        name: String,
        skip: Option<Skip>,
        children: Vec<Pending>,
        error: Option<Failure>,
    },
}

impl Pending {
    fn skip_slot(&mut self) -> &mut Option<Skip> {
        match self {
            Self::Test { skip, .. } | Self::Group { skip, .. } => skip,
        }
    }
}

/// Marks the node just registered as skipped
pub struct Registration<'a> {
    skip: &'a mut Option<Skip>,
}

impl Registration<'_> {
    /// Skip without a reason.
    pub fn skip(self) {
        *self.skip = Some(Skip::default());
    }

    /// Skip, reporting `reason`.
    pub fn skip_because(self, reason: impl Into<String>) {
        *self.skip = Some(Skip {
            reason: Some(reason.into()),
        });
    }
}

/// Receives the test tree of a container
#[derive(Default)]
pub struct Collector {
    nodes: Vec<Pending>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf test.
    pub fn test<F>(&mut self, name: impl Into<String>, body: F) -> Registration<'_>
    where
        F: FnOnce() -> Check + Send + 'static,
    {
        self.push(Pending::Test {
            name: name.into(),
            skip: None,
            body: Box::new(body),
        })
    }

    /// Register a group; `body` registers its children right away.
    ///
    /// An error or panic in `body` becomes a failure of the group. Children
    /// registered before it still run.
    pub fn group<F>(&mut self, name: impl Into<String>, body: F) -> Registration<'_>
    where
        F: FnOnce(&mut Collector) -> std::result::Result<(), GroupError>,
    {
        let name = name.into();
        let mut inner = Collector::new();
        let error = registration_failure(&name, || body(&mut inner));
        self.push(Pending::Group {
            name,
            skip: None,
            children: inner.nodes,
            error,
        })
    }

    /// Number of top-level registrations.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: Pending) -> Registration<'_> {
        self.nodes.push(node);
        let last = self.nodes.len() - 1;
        Registration {
            skip: self.nodes[last].skip_slot(),
        }
    }
}

fn registration_failure<F>(name: &str, body: F) -> Option<Failure>
where
    F: FnOnce() -> std::result::Result<(), GroupError>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => None,
        Ok(Err(error)) => {
            debug!("Registration of {} failed: {}", name, error);
            Some(Failure::from_error(error.as_ref()))
        }
        Err(payload) => Some(Failure::from_panic(payload.as_ref())),
    }
}

/// Executes registered tests on a worker pool
pub struct TestRunner {
    pool: rayon::ThreadPool,
    filter: FrameFilter,
}

impl TestRunner {
    /// Runner with `jobs` worker threads.
    pub fn new(jobs: usize, filter: FrameFilter) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.max(1))
            .thread_name(|i| format!("jazel-test-{i}"))
            .build()?;
        Ok(Self { pool, filter })
    }

    pub fn filter(&self) -> &FrameFilter {
        &self.filter
    }

    /// Register and execute `container`, returning its result tree.
    ///
    /// The root of the tree is a group named after the container.
    pub fn run(&self, container: &dyn TestContainer) -> TestOutcome {
        let name = container.name().to_string();
        let mut collector = Collector::new();
        let mut error = registration_failure(&name, || container.register(&mut collector));
        if let Some(failure) = error.as_mut() {
            self.filter.apply(failure);
        }

        TestOutcome::Group {
            children: self.execute_branches(collector.nodes),
            name,
            error,
        }
    }

    fn execute_branches(&self, nodes: Vec<Pending>) -> Vec<TestOutcome> {
        let count = nodes.len();
        let (tx, rx) = mpsc::channel::<(usize, TestOutcome)>();
        let filter = &self.filter;

        self.pool.scope(|scope| {
            for (index, node) in nodes.into_iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = execute(node, None, filter);
                    let _ = tx.send((index, outcome));
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<TestOutcome>> = (0..count).map(|_| None).collect();
        for (index, outcome) in rx {
            slots[index] = Some(outcome);
        }
        slots.into_iter().flatten().collect()
    }
}

fn execute(node: Pending, inherited: Option<&Skip>, filter: &FrameFilter) -> TestOutcome {
    match node {
        Pending::Test { name, skip, body } => {
            if let Some(skip) = skip.as_ref().or(inherited) {
                return TestOutcome::Test(TestResult {
                    name,
                    status: TestStatus::Skipped,
                    failure: None,
                    skip_reason: skip.reason.clone(),
                });
            }

            let failure = match panic::catch_unwind(AssertUnwindSafe(body)) {
                Ok(Ok(())) => None,
                Ok(Err(failure)) => Some(failure),
                Err(payload) => Some(Failure::from_panic(payload.as_ref())),
            };
            let failure = failure.map(|mut f| {
                filter.apply(&mut f);
                f
            });
            TestOutcome::Test(TestResult {
                name,
                status: if failure.is_some() {
                    TestStatus::Failed
                } else {
                    TestStatus::Passed
                },
                failure,
                skip_reason: None,
            })
        }
        Pending::Group {
            name,
            skip,
            children,
            error,
        } => {
            let skip = skip.as_ref().or(inherited);
            let children = children
                .into_iter()
                .map(|child| execute(child, skip, filter))
                .collect();
            // a skipped group never ran, so neither did its registration error
            let error = if skip.is_some() {
                None
            } else {
                error.map(|mut f| {
                    filter.apply(&mut f);
                    f
                })
            };
            TestOutcome::Group {
                name,
                children,
                error,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Counts;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixture;

    impl TestContainer for Fixture {
        fn name(&self) -> &str {
            "CartTest"
        }

        fn register(&self, c: &mut Collector) -> std::result::Result<(), GroupError> {
            c.test("adds", || Ok(()));
            c.test("removes", || ensure_eq(1 + 1, 3));
            c.group("totals", |c| {
                c.test("sums", || Ok(()));
                c.test("rounds", || Ok(())).skip_because("flaky");
                Err("price table missing".into())
            });
            c.group("ignored", |c| {
                c.test("never", || panic!("must not run"));
                Ok(())
            })
            .skip();
            c.test("panics", || panic!("index out of bounds"));
            Ok(())
        }
    }

    fn names(children: &[TestOutcome]) -> Vec<&str> {
        children.iter().map(TestOutcome::name).collect()
    }

    #[test]
    fn test_run_preserves_order_and_counts() {
        let runner = TestRunner::new(4, FrameFilter::default()).unwrap();
        let outcome = runner.run(&Fixture);

        let TestOutcome::Group { name, children, error } = &outcome else {
            panic!("root must be a group");
        };
        assert_eq!(name, "CartTest");
        assert!(error.is_none());
        assert_eq!(names(children), vec!["adds", "removes", "totals", "ignored", "panics"]);

        assert_eq!(
            outcome.counts(),
            Counts {
                passed: 2,
                failed: 3,
                skipped: 2
            }
        );
    }

    #[test]
    fn test_group_error_keeps_registered_children() {
        let runner = TestRunner::new(1, FrameFilter::default()).unwrap();
        let outcome = runner.run(&Fixture);
        let TestOutcome::Group { children, .. } = outcome else {
            unreachable!()
        };
        let TestOutcome::Group { children, error, .. } = &children[2] else {
            panic!("totals must be a group");
        };
        assert_eq!(error.as_ref().unwrap().message, "price table missing");
        assert_eq!(names(children), vec!["sums", "rounds"]);
    }

    #[test]
    fn test_failure_messages() {
        let runner = TestRunner::new(2, FrameFilter::default()).unwrap();
        let outcome = runner.run(&Fixture);
        let mut failures = Vec::new();
        outcome.walk(&mut |_, node| {
            if let TestOutcome::Test(result) = node
                && let Some(failure) = &result.failure
            {
                failures.push(failure.message.clone());
            }
        });
        assert_eq!(
            failures,
            vec!["expected 3, got 2", "panicked: index out of bounds"]
        );
    }

    #[test]
    fn test_skipped_group_body_not_executed() {
        struct Counting(Arc<AtomicUsize>);
        impl TestContainer for Counting {
            fn name(&self) -> &str {
                "Counting"
            }
            fn register(&self, c: &mut Collector) -> std::result::Result<(), GroupError> {
                let hits = Arc::clone(&self.0);
                c.group("g", move |c| {
                    c.test("t", move || {
                        let _ = hits.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    });
                    Ok(())
                })
                .skip();
                Ok(())
            }
        }

        let hits = Arc::new(AtomicUsize::new(0));
        let runner = TestRunner::new(2, FrameFilter::default()).unwrap();
        let outcome = runner.run(&Counting(Arc::clone(&hits)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.counts().skipped, 1);
    }

    #[test]
    fn test_container_registration_error() {
        struct Broken;
        impl TestContainer for Broken {
            fn name(&self) -> &str {
                "Broken"
            }
            fn register(&self, c: &mut Collector) -> std::result::Result<(), GroupError> {
                c.test("first", || Ok(()));
                Err("static initializer failed".into())
            }
        }

        let runner = TestRunner::new(1, FrameFilter::default()).unwrap();
        let outcome = runner.run(&Broken);
        assert_eq!(
            outcome.counts(),
            Counts {
                passed: 1,
                failed: 1,
                skipped: 0
            }
        );
    }
}
