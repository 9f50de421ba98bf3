//! Compiler diagnostics and `javac` output parsing
//!
//! `javac` reports problems as
//!
//! ```text
//! src/main/java/a/B.java:12: error: cannot find symbol
//!         foo();
//!         ^
//!   symbol:   method foo()
//!   location: class B
//! 1 error
//! ```
//!
//! The header line carries file, line, severity and message; the caret line
//! gives the column; indented detail lines extend the message.

use crate::layout::ProjectLayout;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Compilation failed for this unit
    Error,
    /// Lint or deprecation warning
    Warning,
    /// Informational note
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Note => write!(f, "note"),
        }
    }
}

/// A compiler diagnostic attached to one source unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Message, including any detail lines
    pub message: String,
    /// Project-relative source path
    pub path: String,
    /// 1-based line, 0 when the diagnostic is about the whole file
    pub line: u32,
    /// 1-based column, when the compiler printed a caret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Diagnostic {
    /// Whether this diagnostic blocks the unit's output.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)?;
        if let Some(column) = self.column {
            write!(f, ":{column}")?;
        }
        write!(f, ": {}: {}", self.severity, self.message)
    }
}

/// Everything a compiler run printed, split by attribution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDiagnostics {
    /// Diagnostics tied to a source file, in output order
    pub diagnostics: Vec<Diagnostic>,
    /// Lines that belong to no file (`error: invalid flag`, global notes)
    pub general: Vec<String>,
}

impl ParsedDiagnostics {
    /// Diagnostics for one project-relative path.
    pub fn for_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.diagnostics.iter().filter(move |d| d.path == path)
    }

    /// Whether any file-attributed error was reported.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Parser for `javac` diagnostics
pub struct JavacOutputParser {
    /// `path:line: kind: message`
    header: Regex,
    /// `Note: path message`
    file_note: Regex,
    /// `N errors` / `N warnings`
    summary: Regex,
}

impl Default for JavacOutputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl JavacOutputParser {
    pub fn new() -> Self {
        let header = Regex::new(
            r"^(?P<path>.+\.java):(?P<line>\d+): (?P<kind>error|warning|Note|note): (?P<message>.*)$",
        )
        .unwrap();
        let file_note = Regex::new(r"^Note: (?P<path>\S+\.java) (?P<message>.*)$").unwrap();
        let summary = Regex::new(r"^\d+ (errors?|warnings?)$").unwrap();

        Self {
            header,
            file_note,
            summary,
        }
    }

    /// Parse `javac` output (stdout and stderr concatenated).
    pub fn parse(&self, output: &str, layout: &ProjectLayout) -> ParsedDiagnostics {
        let mut parsed = ParsedDiagnostics::default();
        let mut current: Option<Diagnostic> = None;
        let mut seen_source_line = false;

        for line in output.lines() {
            if let Some(caps) = self.header.captures(line) {
                if let Some(done) = current.take() {
                    parsed.diagnostics.push(done);
                }
                let severity = match &caps["kind"] {
                    "error" => Severity::Error,
                    "warning" => Severity::Warning,
                    _ => Severity::Note,
                };
                current = Some(Diagnostic {
                    severity,
                    message: caps["message"].trim().to_string(),
                    path: normalize(&caps["path"], layout),
                    line: caps["line"].parse().unwrap_or(0),
                    column: None,
                });
                seen_source_line = false;
                continue;
            }

            if let Some(caps) = self.file_note.captures(line) {
                if let Some(done) = current.take() {
                    parsed.diagnostics.push(done);
                }
                parsed.diagnostics.push(Diagnostic {
                    severity: Severity::Note,
                    message: caps["message"].trim().to_string(),
                    path: normalize(&caps["path"], layout),
                    line: 0,
                    column: None,
                });
                continue;
            }

            if self.summary.is_match(line.trim()) {
                if let Some(done) = current.take() {
                    parsed.diagnostics.push(done);
                }
                continue;
            }

            match current.as_mut() {
                Some(diagnostic) => {
                    if line.trim() == "^" && diagnostic.column.is_none() {
                        let offset = line.find('^').unwrap_or(0);
                        diagnostic.column = u32::try_from(offset + 1).ok();
                    } else if !seen_source_line {
                        // echo of the offending source line
                        seen_source_line = true;
                    } else if !line.trim().is_empty() {
                        diagnostic.message.push('\n');
                        diagnostic.message.push_str(line.trim());
                    }
                }
                None => {
                    if !line.trim().is_empty() {
                        parsed.general.push(line.trim().to_string());
                    }
                }
            }
        }

        if let Some(done) = current.take() {
            parsed.diagnostics.push(done);
        }
        parsed
    }
}

fn normalize(raw: &str, layout: &ProjectLayout) -> String {
    let cleaned = raw.replace('\\', "/");
    layout
        .relative(Path::new(&cleaned))
        .unwrap_or(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
src/main/java/a/B.java:12: error: cannot find symbol
        foo();
        ^
  symbol:   method foo()
  location: class B
src/main/java/a/C.java:3: warning: [rawtypes] found raw type: List
    List items;
    ^
  missing type arguments for generic class List<E>
Note: src/main/java/a/D.java uses unchecked or unsafe operations.
Note: Recompile with -Xlint:unchecked for details.
1 error
1 warning
";

    #[test]
    fn test_parse_errors_and_warnings() {
        let layout = ProjectLayout::new("/p");
        let parsed = JavacOutputParser::new().parse(OUTPUT, &layout);

        assert_eq!(parsed.diagnostics.len(), 3);
        let error = &parsed.diagnostics[0];
        assert_eq!(error.severity, Severity::Error);
        assert_eq!(error.path, "src/main/java/a/B.java");
        assert_eq!(error.line, 12);
        assert_eq!(error.column, Some(9));
        assert_eq!(
            error.message,
            "cannot find symbol\nsymbol:   method foo()\nlocation: class B"
        );

        let warning = &parsed.diagnostics[1];
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.column, Some(5));

        let note = &parsed.diagnostics[2];
        assert_eq!(note.severity, Severity::Note);
        assert_eq!(note.path, "src/main/java/a/D.java");
        assert_eq!(note.line, 0);

        assert_eq!(parsed.general, vec!["Note: Recompile with -Xlint:unchecked for details."]);
        assert!(parsed.has_errors());
    }

    #[test]
    fn test_unattributed_errors() {
        let layout = ProjectLayout::new("/p");
        let parsed = JavacOutputParser::new().parse("error: invalid flag: -Xbogus\nUsage: javac <options> <source files>\n", &layout);
        assert!(parsed.diagnostics.is_empty());
        assert!(!parsed.has_errors());
        assert_eq!(parsed.general.len(), 2);
    }

    #[test]
    fn test_absolute_paths_made_relative() {
        let layout = ProjectLayout::new("/p");
        let parsed = JavacOutputParser::new().parse("/p/src/main/java/A.java:1: error: oops\n", &layout);
        assert_eq!(parsed.diagnostics[0].path, "src/main/java/A.java");
        assert_eq!(parsed.for_path("src/main/java/A.java").count(), 1);
    }

    #[test]
    fn test_display() {
        let diagnostic = Diagnostic {
            severity: Severity::Warning,
            message: "deprecated".into(),
            path: "src/A.java".into(),
            line: 4,
            column: Some(2),
        };
        assert_eq!(diagnostic.to_string(), "src/A.java:4:2: warning: deprecated");
    }
}
