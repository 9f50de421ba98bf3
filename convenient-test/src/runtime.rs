//! Running test classes in an external JVM
//!
//! The runtime entry point loads one test class and writes one JSON event
//! per line on stdout:
//!
//! ```text
//! {"event":"groupStarted","name":"totals"}
//! {"event":"test","name":"sums","status":"passed"}
//! {"event":"test","name":"rounds","status":"skipped","skipReason":"flaky"}
//! {"event":"groupFailed","message":"price table missing","causes":[],"stackTrace":[]}
//! {"event":"groupFinished"}
//! ```
//!
//! Lines that are not events are test output and only logged.

use crate::collector::{Collector, GroupError};
use crate::container::{ContainerLoader, TestContainer, TestUnit};
use crate::coverage::{CoverageMode, agent_argument};
use crate::error::{Result, TestError};
use crate::outcome::{Failure, TestStatus};
use convenient_java::compiler::join_classpath;
use convenient_java::toolchain::run_captured;
use convenient_java::{ProjectLayout, SourceRole};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, warn};

/// Entry point class used when none is configured
pub const DEFAULT_ENTRY_POINT: &str = "org.jazel.runtime.ContainerMain";

/// One line of the runtime's event stream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RuntimeEvent {
    GroupStarted {
        name: String,
    },
    GroupFinished,
    GroupFailed {
        message: String,
        #[serde(default)]
        causes: Vec<String>,
        #[serde(default, rename = "stackTrace")]
        stack_trace: Vec<String>,
    },
    Test {
        name: String,
        status: TestStatus,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        causes: Vec<String>,
        #[serde(default, rename = "stackTrace")]
        stack_trace: Vec<String>,
        #[serde(default, rename = "skipReason")]
        skip_reason: Option<String>,
    },
    LoadFailed {
        message: String,
    },
}

/// Recorded result tree of one runtime execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamNode {
    Group {
        name: String,
        children: Vec<StreamNode>,
        error: Option<Failure>,
    },
    Test {
        name: String,
        status: TestStatus,
        failure: Option<Failure>,
        skip_reason: Option<String>,
    },
}

/// Replays a recorded event stream as a [`TestContainer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamContainer {
    name: String,
    nodes: Vec<StreamNode>,
    error: Option<Failure>,
}

impl StreamContainer {
    /// Build the result tree from runtime stdout.
    ///
    /// A `loadFailed` event yields `Err` with its message. Unclosed groups
    /// are closed at end of stream.
    pub fn parse(name: impl Into<String>, stdout: &str) -> std::result::Result<Self, String> {
        struct Open {
            name: String,
            children: Vec<StreamNode>,
            error: Option<Failure>,
        }

        let mut root = Open {
            name: name.into(),
            children: Vec::new(),
            error: None,
        };
        let mut stack: Vec<Open> = Vec::new();

        for line in stdout.lines() {
            let line = line.trim();
            if !line.starts_with('{') {
                if !line.is_empty() {
                    debug!("runtime: {}", line);
                }
                continue;
            }
            let event = match serde_json::from_str::<RuntimeEvent>(line) {
                Ok(event) => event,
                Err(e) => {
                    debug!("Ignoring non-event line ({}): {}", e, line);
                    continue;
                }
            };
            match event {
                RuntimeEvent::GroupStarted { name } => stack.push(Open {
                    name,
                    children: Vec::new(),
                    error: None,
                }),
                RuntimeEvent::GroupFinished => {
                    if let Some(done) = stack.pop() {
                        stack.last_mut().unwrap_or(&mut root).children.push(StreamNode::Group {
                            name: done.name,
                            children: done.children,
                            error: done.error,
                        });
                    } else {
                        warn!("Unbalanced groupFinished event in runtime output");
                    }
                }
                RuntimeEvent::GroupFailed {
                    message,
                    causes,
                    stack_trace,
                } => {
                    let current = stack.last_mut().unwrap_or(&mut root);
                    current.error = Some(
                        Failure::new(message)
                            .with_causes(causes)
                            .with_stack_trace(stack_trace),
                    );
                }
                RuntimeEvent::Test {
                    name,
                    status,
                    message,
                    causes,
                    stack_trace,
                    skip_reason,
                } => {
                    let failure = (status == TestStatus::Failed).then(|| {
                        Failure::new(message.unwrap_or_default())
                            .with_causes(causes)
                            .with_stack_trace(stack_trace)
                    });
                    let current = stack.last_mut().unwrap_or(&mut root);
                    current.children.push(StreamNode::Test {
                        name,
                        status,
                        failure,
                        skip_reason,
                    });
                }
                RuntimeEvent::LoadFailed { message } => return Err(message),
            }
        }

        while let Some(done) = stack.pop() {
            stack.last_mut().unwrap_or(&mut root).children.push(StreamNode::Group {
                name: done.name,
                children: done.children,
                error: done.error,
            });
        }

        Ok(Self {
            name: root.name,
            nodes: root.children,
            error: root.error,
        })
    }

    pub fn nodes(&self) -> &[StreamNode] {
        &self.nodes
    }
}

impl TestContainer for StreamContainer {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, collector: &mut Collector) -> std::result::Result<(), GroupError> {
        replay(&self.nodes, collector);
        match &self.error {
            Some(failure) => Err(failure.clone().into()),
            None => Ok(()),
        }
    }
}

fn replay(nodes: &[StreamNode], collector: &mut Collector) {
    for node in nodes {
        match node {
            StreamNode::Test {
                name,
                status,
                failure,
                skip_reason,
            } => {
                let failure = failure.clone();
                let registration = collector.test(name.clone(), move || match failure {
                    Some(failure) => Err(failure),
                    None => Ok(()),
                });
                if *status == TestStatus::Skipped {
                    match skip_reason {
                        Some(reason) => registration.skip_because(reason.clone()),
                        None => registration.skip(),
                    }
                }
            }
            StreamNode::Group {
                name,
                children,
                error,
            } => {
                let _ = collector.group(name.clone(), |c| {
                    replay(children, c);
                    match error {
                        Some(failure) => Err(failure.clone().into()),
                        None => Ok(()),
                    }
                });
            }
        }
    }
}

/// Flags and locations for launching the runtime
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub java: PathBuf,
    pub entry_point: String,
    /// Library jars and directories, after the class directories
    pub libraries: Vec<PathBuf>,
    pub coverage: CoverageMode,
    pub coverage_agent: Option<PathBuf>,
    pub coverage_exec: Option<PathBuf>,
    pub verbose: bool,
    pub cache: bool,
    pub log_file: Option<PathBuf>,
    pub profiler_pause: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            java: PathBuf::from("java"),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            libraries: Vec::new(),
            coverage: CoverageMode::None,
            coverage_agent: None,
            coverage_exec: None,
            verbose: false,
            cache: true,
            log_file: None,
            profiler_pause: false,
        }
    }
}

/// Builds runtime command lines and loads containers through them
pub struct RuntimeLoader<'a> {
    layout: &'a ProjectLayout,
    settings: RuntimeSettings,
}

impl<'a> RuntimeLoader<'a> {
    pub fn new(layout: &'a ProjectLayout, settings: RuntimeSettings) -> Self {
        Self { layout, settings }
    }

    /// Runtime classpath.
    ///
    /// Test classes come first, except when only main classes are
    /// instrumented for coverage.
    pub fn classpath(&self) -> Vec<PathBuf> {
        let root = self.layout.root();
        let main = root.join(self.layout.classes_dir(SourceRole::Main));
        let test = root.join(self.layout.classes_dir(SourceRole::Test));
        let mut classpath = if self.settings.coverage == CoverageMode::Sources {
            vec![main, test]
        } else {
            vec![test, main]
        };
        classpath.extend(self.settings.libraries.iter().map(|lib| root.join(lib)));
        classpath
    }

    /// `java [agent] -cp <classpath> <entry point> [flags] --container <class>`
    pub fn command(&self, class_name: &str) -> Result<Command> {
        let settings = &self.settings;
        let mut cmd = Command::new(&settings.java);
        let _ = cmd.current_dir(self.layout.root());

        if settings.coverage.is_enabled()
            && let (Some(agent), Some(exec)) = (&settings.coverage_agent, &settings.coverage_exec)
        {
            let _ = cmd.arg(agent_argument(agent, exec));
        }

        let _ = cmd
            .arg("-cp")
            .arg(join_classpath(&self.classpath())?)
            .arg(&settings.entry_point);
        if settings.verbose {
            let _ = cmd.arg("--verbose");
        }
        if !settings.cache {
            let _ = cmd.arg("--no-cache");
        }
        if let Some(log_file) = &settings.log_file {
            let _ = cmd.arg("--log-file").arg(log_file);
        }
        let _ = cmd
            .arg("--project")
            .arg(self.layout.root())
            .arg("--coverage")
            .arg(settings.coverage.to_string());
        if settings.profiler_pause {
            let _ = cmd.arg("--profiler-pause");
        }
        let _ = cmd.arg("--container").arg(class_name);
        Ok(cmd)
    }
}

impl ContainerLoader for RuntimeLoader<'_> {
    fn load(&self, unit: &TestUnit) -> Result<Arc<dyn TestContainer>> {
        let output = run_captured(self.command(&unit.class_name)?)?;
        let simple = unit
            .class_name
            .rsplit('.')
            .next()
            .unwrap_or(&unit.class_name)
            .to_string();

        let container =
            StreamContainer::parse(simple, &output.stdout).map_err(|reason| TestError::Load {
                class: unit.class_name.clone(),
                reason,
            })?;

        if !output.success() && container.nodes().is_empty() && container.error.is_none() {
            return Err(TestError::Load {
                class: unit.class_name.clone(),
                reason: format!(
                    "runtime exited with code {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }
        Ok(Arc::new(container))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::TestRunner;
    use crate::outcome::{Counts, FrameFilter, TestOutcome};

    const STREAM: &str = r#"
Picked up JAVA_TOOL_OPTIONS: -Xmx1g
{"event":"test","name":"adds","status":"passed"}
{"event":"groupStarted","name":"totals"}
{"event":"test","name":"sums","status":"failed","message":"expected 3","stackTrace":["at jdk.internal.reflect.X.invoke","at shop.CartTest.sums(CartTest.java:9)"]}
{"event":"test","name":"rounds","status":"skipped","skipReason":"flaky"}
{"event":"groupFailed","message":"price table missing","causes":["java.io.FileNotFoundException: prices.csv"]}
{"event":"groupFinished"}
some test printed this
{"event":"groupStarted","name":"unclosed"}
{"event":"test","name":"late","status":"passed"}
"#;

    #[test]
    fn test_parse_stream_tree() {
        let container = StreamContainer::parse("CartTest", STREAM).unwrap();
        assert_eq!(container.nodes().len(), 3);
        let StreamNode::Group { name, children, error } = &container.nodes()[1] else {
            panic!("expected group");
        };
        assert_eq!(name, "totals");
        assert_eq!(children.len(), 2);
        assert_eq!(
            error.as_ref().unwrap().causes,
            vec!["java.io.FileNotFoundException: prices.csv"]
        );
        assert!(matches!(&container.nodes()[2], StreamNode::Group { name, .. } if name == "unclosed"));
    }

    #[test]
    fn test_load_failed_event() {
        let err = StreamContainer::parse(
            "X",
            r#"{"event":"loadFailed","message":"class X has no registration method"}"#,
        )
        .unwrap_err();
        assert_eq!(err, "class X has no registration method");
    }

    #[test]
    fn test_replay_through_runner() {
        let container = StreamContainer::parse("CartTest", STREAM).unwrap();
        let runner = TestRunner::new(2, FrameFilter::default()).unwrap();
        let outcome = runner.run(&container);

        assert_eq!(
            outcome.counts(),
            Counts {
                passed: 2,
                failed: 2,
                skipped: 1
            }
        );

        let mut traces = Vec::new();
        outcome.walk(&mut |_, node| {
            if let TestOutcome::Test(result) = node
                && let Some(failure) = &result.failure
            {
                traces.extend(failure.stack_trace.clone());
            }
        });
        assert_eq!(traces, vec!["at shop.CartTest.sums(CartTest.java:9)"]);
    }

    #[test]
    fn test_command_line() {
        let layout = ProjectLayout::new("/p");
        let loader = RuntimeLoader::new(
            &layout,
            RuntimeSettings {
                coverage: CoverageMode::Tests,
                coverage_agent: Some("/opt/agent.jar".into()),
                coverage_exec: Some("/p/build/coverage/jazel.exec".into()),
                verbose: true,
                cache: false,
                log_file: Some("/tmp/jazel.log".into()),
                libraries: vec!["lib/junit.jar".into()],
                ..RuntimeSettings::default()
            },
        );
        let cmd = loader.command("shop.CartTest").unwrap();
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().to_string()).collect();
        let separator = if cfg!(windows) { ";" } else { ":" };
        assert_eq!(
            args,
            vec![
                "-javaagent:/opt/agent.jar=destfile=/p/build/coverage/jazel.exec".to_string(),
                "-cp".into(),
                format!(
                    "/p/build/classes/test{separator}/p/build/classes/main{separator}/p/lib/junit.jar"
                ),
                DEFAULT_ENTRY_POINT.into(),
                "--verbose".into(),
                "--no-cache".into(),
                "--log-file".into(),
                "/tmp/jazel.log".into(),
                "--project".into(),
                "/p".into(),
                "--coverage".into(),
                "tests".into(),
                "--container".into(),
                "shop.CartTest".into(),
            ]
        );
    }

    #[test]
    fn test_sources_coverage_puts_main_first() {
        let layout = ProjectLayout::new("/p");
        let loader = RuntimeLoader::new(
            &layout,
            RuntimeSettings {
                coverage: CoverageMode::Sources,
                ..RuntimeSettings::default()
            },
        );
        assert_eq!(loader.classpath()[0], PathBuf::from("/p/build/classes/main"));
    }
}
