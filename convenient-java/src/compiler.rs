//! Compiler invocation and output mapping
//!
//! [`CompilationOrchestrator`] turns a [`BuildPlan`] into at most one
//! compiler invocation per source root, maps the produced class files back
//! to their sources and assembles the next [`BuildLedger`].

use crate::diagnostics::{JavacOutputParser, ParsedDiagnostics};
use crate::error::{BuildError, Result};
use crate::layout::{ProjectLayout, SourceRole};
use crate::ledger::{BuildLedger, CompiledUnitRecord, SourceUnitRecord};
use crate::resolver::{BuildPlan, PlannedUnit};
use crate::timestamp::stamp_millis;
use crate::toolchain::{JavaToolchain, ProcessOutput, run_captured};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// One batch of sources sharing an output directory and classpath
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Source root being compiled
    pub role: SourceRole,
    /// Absolute class output directory
    pub output_dir: PathBuf,
    /// Classpath entries, in order
    pub classpath: Vec<PathBuf>,
    /// Project-relative source paths
    pub sources: Vec<String>,
}

/// Something that can compile a [`CompileRequest`]
pub trait CompilerBackend {
    /// Name used in error messages.
    fn program(&self) -> String;

    /// Version fingerprint recorded in the ledger.
    fn version(&self) -> Result<String>;

    /// Compile `request` with `root` as the working directory.
    ///
    /// A non-zero exit is reported through [`ProcessOutput::exit_code`],
    /// not as an error; only a failure to run at all is an `Err`.
    fn compile(&self, root: &Path, request: &CompileRequest) -> Result<ProcessOutput>;
}

/// Flags passed to every compiler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Lint and warning flags
    pub lint: Vec<String>,
    /// Any further arguments
    pub args: Vec<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            lint: vec!["-Xlint:all".to_string()],
            args: Vec::new(),
        }
    }
}

/// The `javac` executable
#[derive(Debug, Clone)]
pub struct Javac {
    toolchain: JavaToolchain,
    options: CompilerOptions,
}

impl Javac {
    pub fn new(toolchain: JavaToolchain) -> Self {
        Self {
            toolchain,
            options: CompilerOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// `javac -d <out> -cp <classpath> <lint> <args> <sources>`
    pub fn command(&self, root: &Path, request: &CompileRequest) -> Result<Command> {
        let mut cmd = Command::new(&self.toolchain.javac);
        let _ = cmd
            .current_dir(root)
            .arg("-d")
            .arg(&request.output_dir)
            .arg("-cp")
            .arg(join_classpath(&request.classpath)?)
            .args(&self.options.lint)
            .args(&self.options.args)
            .args(&request.sources);
        Ok(cmd)
    }
}

impl CompilerBackend for Javac {
    fn program(&self) -> String {
        self.toolchain.javac.display().to_string()
    }

    fn version(&self) -> Result<String> {
        self.toolchain.compiler_version()
    }

    fn compile(&self, root: &Path, request: &CompileRequest) -> Result<ProcessOutput> {
        run_captured(self.command(root, request)?)
    }
}

/// Join classpath entries with the platform separator.
pub fn join_classpath(entries: &[PathBuf]) -> Result<OsString> {
    std::env::join_paths(entries).map_err(|_| {
        BuildError::InvalidClasspath(
            entries
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        )
    })
}

/// Result of executing a [`BuildPlan`]
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    /// Ledger describing the project after this build
    pub ledger: BuildLedger,
    /// Sources handed to the compiler
    pub compiled: Vec<String>,
    /// Orphaned class files removed from disk
    pub deleted_outputs: Vec<String>,
    /// Everything the compiler reported
    pub diagnostics: ParsedDiagnostics,
    /// Number of compiler processes started
    pub invocations: usize,
}

/// Runs the compiler for a plan and maps the results back
pub struct CompilationOrchestrator<'a> {
    layout: &'a ProjectLayout,
    backend: &'a dyn CompilerBackend,
    libraries: Vec<PathBuf>,
    parser: JavacOutputParser,
}

impl<'a> CompilationOrchestrator<'a> {
    pub fn new(layout: &'a ProjectLayout, backend: &'a dyn CompilerBackend) -> Self {
        Self {
            layout,
            backend,
            libraries: Vec::new(),
            parser: JavacOutputParser::new(),
        }
    }

    /// Jars and directories appended to both classpaths.
    #[must_use]
    pub fn with_libraries(mut self, libraries: Vec<PathBuf>) -> Self {
        self.libraries = libraries;
        self
    }

    /// Classpath for compiling `role`.
    ///
    /// Main sources see the main output and the libraries; test sources
    /// additionally see the main output after their own.
    pub fn classpath(&self, role: SourceRole) -> Vec<PathBuf> {
        let root = self.layout.root();
        let mut classpath = vec![root.join(self.layout.classes_dir(role))];
        if role == SourceRole::Test {
            classpath.push(root.join(self.layout.classes_dir(SourceRole::Main)));
        }
        classpath.extend(self.libraries.iter().map(|lib| root.join(lib)));
        classpath
    }

    /// Compile everything in `plan`.
    ///
    /// Class files are stamped with `build_start`. Fails without touching
    /// the ledger if the compiler cannot be started or exits non-zero with
    /// no error attributed to a source file.
    pub fn execute(&self, plan: &BuildPlan, build_start: i64) -> Result<CompileOutcome> {
        let mut ledger = BuildLedger::new(plan.compiler_version.clone());
        ledger.units.extend(plan.carried.iter().cloned());

        let mut compiled = Vec::new();
        let mut diagnostics = ParsedDiagnostics::default();
        let mut invocations = 0;

        for role in SourceRole::ALL {
            let batch: Vec<&PlannedUnit> =
                plan.compile.iter().filter(|p| p.unit.role == role).collect();
            if batch.is_empty() {
                debug!("No {} sources to compile", role);
                continue;
            }

            let output_dir = self.layout.root().join(self.layout.classes_dir(role));
            fs::create_dir_all(&output_dir)?;
            let mut set_aside = SetAside::default();
            for planned in &batch {
                debug!("Compiling {} ({})", planned.unit.path, planned.reason);
                if let Some(previous) = plan.previous.get(&planned.unit.path) {
                    for output in &previous.compiled_units {
                        set_aside.add(self.layout.absolute(&output.path))?;
                    }
                }
            }

            let request = CompileRequest {
                role,
                output_dir: output_dir.clone(),
                classpath: self.classpath(role),
                sources: batch.iter().map(|p| p.unit.path.clone()).collect(),
            };

            info!("Compiling {} {} source file(s)", request.sources.len(), role);
            let output = match self.backend.compile(self.layout.root(), &request) {
                Ok(output) => output,
                Err(e) => {
                    set_aside.restore();
                    return Err(e);
                }
            };
            invocations += 1;

            let parsed = self.parser.parse(&output.combined(), self.layout);
            if !output.success() && !parsed.has_errors() {
                set_aside.restore();
                return Err(BuildError::CompilerFailed {
                    program: self.backend.program(),
                    code: output.exit_code,
                    stderr: output.stderr.trim().to_string(),
                });
            }
            set_aside.discard()?;
            for line in &parsed.general {
                warn!("{}", line);
            }

            for planned in &batch {
                let unit = &planned.unit;
                let compiled_units = self.collect_outputs(unit, role, build_start)?;
                ledger.units.push(SourceUnitRecord {
                    path: unit.path.clone(),
                    last_modified: unit.last_modified,
                    dependencies: plan.dependencies.get(&unit.path).cloned().unwrap_or_default(),
                    compiled_units,
                    diagnostics: parsed.for_path(&unit.path).cloned().collect(),
                });
                compiled.push(unit.path.clone());
            }

            diagnostics.diagnostics.extend(parsed.diagnostics);
            diagnostics.general.extend(parsed.general);
        }

        let mut deleted_outputs = Vec::new();
        for orphan in plan.orphaned_outputs() {
            if remove_if_present(&self.layout.absolute(&orphan.path))? {
                debug!("Deleted orphaned {}", orphan.path);
                deleted_outputs.push(orphan.path.clone());
            }
        }

        ledger.sort();
        Ok(CompileOutcome {
            ledger,
            compiled,
            deleted_outputs,
            diagnostics,
            invocations,
        })
    }

    /// Class files produced for `unit`: `Name.class` and `Name$*.class`
    /// next to each other in the package directory.
    fn collect_outputs(
        &self,
        unit: &crate::inventory::SourceUnit,
        role: SourceRole,
        build_start: i64,
    ) -> Result<Vec<CompiledUnitRecord>> {
        let Some(stem) = unit.qualified_stem(self.layout) else {
            return Ok(Vec::new());
        };
        let (package_dir, name) = match stem.rsplit_once('/') {
            Some((dir, name)) => (dir.to_string(), name.to_string()),
            None => (String::new(), stem.clone()),
        };
        let relative_dir = self.layout.classes_dir(role).join(&package_dir);
        let dir = self.layout.root().join(&relative_dir);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let nested_prefix = format!("{name}$");
        let mut outputs = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(class_stem) = file_name.strip_suffix(".class") else {
                continue;
            };
            if class_stem != name && !class_stem.starts_with(&nested_prefix) {
                continue;
            }
            let last_modified = stamp_millis(&entry.path(), build_start)?;
            outputs.push(CompiledUnitRecord {
                path: crate::layout::to_slash(&relative_dir.join(&file_name)),
                last_modified,
            });
        }
        outputs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(outputs)
    }
}

/// Previous class files moved out of the way of a compiler run.
///
/// They are renamed with a suffix the output scan ignores, then deleted
/// once the run succeeds or moved back if it fails, so a failed build
/// leaves the outputs the kept ledger describes.
#[derive(Debug, Default)]
struct SetAside {
    moved: Vec<(PathBuf, PathBuf)>,
}

impl SetAside {
    const SUFFIX: &'static str = "jazel-old";

    fn add(&mut self, path: PathBuf) -> Result<()> {
        let mut aside = path.clone().into_os_string();
        aside.push(".");
        aside.push(Self::SUFFIX);
        let aside = PathBuf::from(aside);
        match fs::rename(&path, &aside) {
            Ok(()) => {
                self.moved.push((path, aside));
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn restore(self) {
        for (original, aside) in self.moved {
            if let Err(e) = fs::rename(&aside, &original) {
                warn!("Could not restore {}: {}", original.display(), e);
            }
        }
    }

    fn discard(self) -> Result<()> {
        for (_, aside) in self.moved {
            let _ = remove_if_present(&aside)?;
        }
        Ok(())
    }
}

/// Remove a file, reporting whether it existed.
fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
