//! `jazel test`: build, then run the test classes that need running

use super::Project;
use super::build;
use crate::cli::TestArgs;
use crate::error::{CliError, FAILURE_EXIT_CODE, Result};
use convenient_java::toolchain::run_captured;
use convenient_test::coverage::report_command;
use convenient_test::runtime::DEFAULT_ENTRY_POINT;
use convenient_test::{
    CoverageMode, CoveragePaths, ExitStatus, RuntimeLoader, RuntimeSettings, TestOrchestrator,
    TestRunner,
};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Runtime settings for this invocation: command-line flags over
/// `jazel.yml` over defaults.
pub fn settings(
    project: &Project,
    args: &TestArgs,
    verbose: bool,
    log_file: Option<&Path>,
) -> Result<RuntimeSettings> {
    let config = &project.config;
    let coverage_agent = config.toolchain.coverage_agent.clone();
    if args.coverage.is_enabled() && coverage_agent.is_none() {
        return Err(CliError::MissingCoverageAgent(args.coverage.to_string()));
    }
    let paths = CoveragePaths::for_layout(&project.layout);

    Ok(RuntimeSettings {
        java: config.toolchain.java.clone(),
        entry_point: config
            .test
            .entry_point
            .clone()
            .unwrap_or_else(|| DEFAULT_ENTRY_POINT.to_string()),
        libraries: config.classpath.clone(),
        coverage: args.coverage,
        coverage_agent: coverage_agent.map(|agent| project.root.join(agent)),
        coverage_exec: args.coverage.is_enabled().then_some(paths.exec_file),
        verbose,
        cache: cache_enabled(project, args),
        log_file: log_file.map(Path::to_path_buf),
        profiler_pause: args.profiler_pause,
    })
}

fn cache_enabled(project: &Project, args: &TestArgs) -> bool {
    project.config.test.cache && !args.no_cache
}

pub fn run(
    project: &Project,
    args: &TestArgs,
    verbose: bool,
    log_file: Option<&Path>,
) -> Result<i32> {
    let settings = settings(project, args, verbose, log_file)?;
    let build = build::compile(project)?;

    let toolchain = project.config.toolchain();
    let runtime_version = toolchain.runtime_version()?;
    let jobs = args.jobs.unwrap_or_else(|| project.config.jobs()).max(1);
    let runner = TestRunner::new(jobs, project.config.frame_filter())?;

    println!("🧪 Testing with {} worker(s)", jobs);
    println!("  Runtime:  {}", runtime_version);
    println!("  Coverage: {}", args.coverage);
    println!();

    let paths = CoveragePaths::for_layout(&project.layout);
    if args.coverage.is_enabled() {
        if let Some(dir) = paths.exec_file.parent() {
            fs::create_dir_all(dir)?;
        }
        if paths.exec_file.exists() {
            fs::remove_file(&paths.exec_file)?;
        }
    }

    let loader = RuntimeLoader::new(&project.layout, settings);
    let run = TestOrchestrator::new(&project.layout, &loader, &runner, runtime_version)
        .with_cache(cache_enabled(project, args))
        .run(&build.ledger)?;

    print!("{}", run.report());
    for (class, reason) in &run.load_failures {
        println!("⚠️  Could not load {}: {}", class, reason);
    }

    if args.coverage.is_enabled() {
        coverage_report(project, args.coverage, &paths)?;
    }

    let status = run.exit_status();
    info!("Test phase finished with exit status {}", status);
    Ok(exit_code(build.has_errors(), status))
}

/// Test failures take precedence; otherwise compile errors fail the run
/// even when every test that could run passed.
pub fn exit_code(build_has_errors: bool, status: ExitStatus) -> i32 {
    match status {
        ExitStatus::Success if build_has_errors => FAILURE_EXIT_CODE,
        status => status.code(),
    }
}

fn coverage_report(project: &Project, mode: CoverageMode, paths: &CoveragePaths) -> Result<()> {
    let Some(cli) = &project.config.toolchain.coverage_cli else {
        warn!("No toolchain.coverageCli configured, skipping the coverage report");
        return Ok(());
    };
    if !paths.exec_file.exists() {
        warn!("No coverage data at {}", paths.exec_file.display());
        return Ok(());
    }

    let cmd = report_command(
        &project.config.toolchain.java,
        &project.root.join(cli),
        &project.layout,
        mode,
        paths,
    );
    let output = run_captured(cmd)?;
    if output.success() {
        println!("📊 Coverage report: {}", paths.html_dir.display());
    } else {
        warn!(
            "Coverage report failed with exit code {}: {}",
            output.exit_code,
            output.combined().trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use tempfile::TempDir;

    fn project(config: ProjectConfig) -> (TempDir, Project) {
        let tmp = TempDir::new().unwrap();
        let layout = config.layout(tmp.path());
        let project = Project {
            root: tmp.path().to_path_buf(),
            config,
            layout,
        };
        (tmp, project)
    }

    fn args(coverage: CoverageMode, no_cache: bool) -> TestArgs {
        TestArgs {
            no_cache,
            coverage,
            jobs: None,
            profiler_pause: false,
        }
    }

    #[test]
    fn test_settings_from_config_and_flags() {
        let mut config = ProjectConfig::default();
        config.test.entry_point = Some("my.Runner".into());
        config.toolchain.coverage_agent = Some("lib/agent.jar".into());
        let (tmp, project) = project(config);

        let settings = settings(&project, &args(CoverageMode::Tests, true), true, None).unwrap();
        assert_eq!(settings.entry_point, "my.Runner");
        assert!(!settings.cache);
        assert!(settings.verbose);
        assert_eq!(settings.coverage_agent, Some(tmp.path().join("lib/agent.jar")));
        assert_eq!(
            settings.coverage_exec,
            Some(tmp.path().join("build/coverage/jazel.exec"))
        );
    }

    #[test]
    fn test_coverage_needs_an_agent() {
        let (_tmp, project) = project(ProjectConfig::default());
        let err = settings(&project, &args(CoverageMode::All, false), false, None).unwrap_err();
        assert!(matches!(err, CliError::MissingCoverageAgent(_)));
        assert_eq!(err.exit_code(), -1);
    }

    #[test]
    fn test_default_entry_point_without_coverage() {
        let (_tmp, project) = project(ProjectConfig::default());
        let settings = settings(&project, &args(CoverageMode::None, false), false, None).unwrap();
        assert_eq!(settings.entry_point, DEFAULT_ENTRY_POINT);
        assert!(settings.cache);
        assert!(settings.coverage_exec.is_none());
    }

    #[test]
    fn test_compile_errors_fail_a_passing_run() {
        assert_eq!(exit_code(true, ExitStatus::Success), FAILURE_EXIT_CODE);
        assert_eq!(exit_code(false, ExitStatus::Success), 0);
        assert_eq!(exit_code(true, ExitStatus::TestsFailed), 2);
        assert_eq!(exit_code(true, ExitStatus::ConfigurationError), -1);
    }
}
