//! File-level dependency extraction
//!
//! A source unit depends on another when it names one of the classes the
//! other file declares. Edges are file-level: no symbol resolution, no
//! type checking. [`ImportScanner`] finds them from `import` statements,
//! same-package references and fully qualified names.

use crate::error::Result;
use crate::inventory::SourceUnit;
use crate::layout::ProjectLayout;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;

/// Lookup table from class names to the source files that declare them
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    by_class: BTreeMap<String, String>,
    by_package: BTreeMap<String, BTreeMap<String, String>>,
}

impl SourceIndex {
    /// Index the current inventory.
    ///
    /// Class names follow from file locations: `src/main/java/a/b/C.java`
    /// declares `a.b.C`.
    pub fn new(layout: &ProjectLayout, units: &[SourceUnit]) -> Self {
        let mut index = Self::default();
        for unit in units {
            let Some(class_name) = unit.class_name(layout) else {
                continue;
            };
            let (package, simple) = match class_name.rsplit_once('.') {
                Some((package, simple)) => (package.to_string(), simple.to_string()),
                None => (String::new(), class_name.clone()),
            };
            let _ = index
                .by_package
                .entry(package)
                .or_default()
                .insert(simple, unit.path.clone());
            let _ = index.by_class.insert(class_name, unit.path.clone());
        }
        index
    }

    /// Source path declaring a fully qualified class.
    pub fn lookup(&self, class_name: &str) -> Option<&str> {
        self.by_class.get(class_name).map(String::as_str)
    }

    /// Source path declaring `simple` in `package`.
    pub fn lookup_in_package(&self, package: &str, simple: &str) -> Option<&str> {
        self.by_package
            .get(package)
            .and_then(|classes| classes.get(simple))
            .map(String::as_str)
    }

    /// Resolve a dotted reference, accepting nested-class suffixes
    /// (`a.b.C.Inner` resolves to the file declaring `a.b.C`).
    pub fn resolve_qualified(&self, name: &str) -> Option<&str> {
        let mut candidate = name;
        loop {
            if let Some(path) = self.lookup(candidate) {
                return Some(path);
            }
            candidate = candidate.rsplit_once('.')?.0;
        }
    }

    /// Number of indexed classes.
    pub fn len(&self) -> usize {
        self.by_class.len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }
}

/// Collaborator that supplies the direct dependencies of one source unit
pub trait DependencyExtractor {
    /// Project-relative paths of the units `unit` depends on.
    ///
    /// Only paths present in `index` are returned, and never `unit` itself.
    fn extract(
        &self,
        layout: &ProjectLayout,
        unit: &SourceUnit,
        index: &SourceIndex,
    ) -> Result<BTreeSet<String>>;
}

/// Dependency extractor reading Java source text
pub struct ImportScanner {
    package: Regex,
    import: Regex,
    reference: Regex,
}

impl Default for ImportScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportScanner {
    pub fn new() -> Self {
        let package = Regex::new(r"(?m)^\s*package\s+([\w.]+)\s*;").unwrap();
        let import = Regex::new(r"(?m)^\s*import\s+(static\s+)?([\w.]+?)(\.\*)?\s*;").unwrap();
        let reference = Regex::new(r"[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*").unwrap();

        Self {
            package,
            import,
            reference,
        }
    }

    /// Dependencies named in `source`, resolved against `index`.
    pub fn scan_source(&self, source: &str, index: &SourceIndex) -> BTreeSet<String> {
        let code = strip_comments_and_literals(source);
        let package = self
            .package
            .captures(&code)
            .map(|caps| caps[1].to_string())
            .unwrap_or_default();

        let mut found = BTreeSet::new();
        let mut single: BTreeMap<String, String> = BTreeMap::new();
        let mut wildcard = vec![package.clone()];

        for caps in self.import.captures_iter(&code) {
            let name = &caps[2];
            let is_static = caps.get(1).is_some();
            let is_wildcard = caps.get(3).is_some();

            if is_wildcard {
                if is_static {
                    // import static a.b.C.*
                    if let Some(path) = index.resolve_qualified(name) {
                        let _ = found.insert(path.to_string());
                    }
                } else if let Some(path) = index.lookup(name) {
                    // import a.b.C.* names nested classes of C
                    let _ = found.insert(path.to_string());
                } else {
                    wildcard.push(name.to_string());
                }
                continue;
            }

            if let Some(path) = index.resolve_qualified(name) {
                let _ = found.insert(path.to_string());
                if let Some((_, simple)) = name.rsplit_once('.') {
                    let _ = single.insert(simple.to_string(), path.to_string());
                }
            }
        }

        let without_package = self.package.replace(&code, "");
        let body = self.import.replace_all(&without_package, "");
        for reference in self.reference.find_iter(&body) {
            let text = reference.as_str();
            let first = text.split('.').next().unwrap_or(text);

            if let Some(path) = single.get(first) {
                let _ = found.insert(path.clone());
                continue;
            }
            if first.starts_with(|c: char| c.is_ascii_uppercase())
                && let Some(path) = wildcard
                    .iter()
                    .find_map(|package| index.lookup_in_package(package, first))
            {
                let _ = found.insert(path.to_string());
                continue;
            }
            if text.contains('.')
                && let Some(path) = index.resolve_qualified(text)
            {
                let _ = found.insert(path.to_string());
            }
        }

        found
    }
}

impl DependencyExtractor for ImportScanner {
    fn extract(
        &self,
        layout: &ProjectLayout,
        unit: &SourceUnit,
        index: &SourceIndex,
    ) -> Result<BTreeSet<String>> {
        // javac accepts other encodings through `-encoding`
        let bytes = fs::read(layout.absolute(&unit.path))?;
        let source = String::from_utf8_lossy(&bytes);
        let mut found = self.scan_source(&source, index);
        let _ = found.remove(&unit.path);
        Ok(found)
    }
}

/// Replace comments, string, text block and char literals with spaces,
/// keeping line structure.
fn strip_comments_and_literals(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && next == Some('*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                if chars[i] == '\n' {
                    out.push('\n');
                }
                i += 1;
            }
            i += 2;
            out.push(' ');
        } else if c == '"' && next == Some('"') && chars.get(i + 2) == Some(&'"') {
            i += 3;
            while i < chars.len()
                && !(chars[i] == '"' && chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"'))
            {
                if chars[i] == '\\' {
                    i += 1;
                } else if chars[i] == '\n' {
                    out.push('\n');
                }
                i += 1;
            }
            i += 3;
            out.push(' ');
        } else if c == '"' || c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != c && chars[i] != '\n' {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i += 1;
            out.push(' ');
        } else {
            out.push(c);
            i += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SourceRole;

    fn unit(path: &str) -> SourceUnit {
        SourceUnit {
            path: path.to_string(),
            role: SourceRole::Main,
            last_modified: 0,
        }
    }

    fn index() -> SourceIndex {
        let layout = ProjectLayout::new("/p");
        SourceIndex::new(
            &layout,
            &[
                unit("src/main/java/shop/Cart.java"),
                unit("src/main/java/shop/Item.java"),
                unit("src/main/java/shop/util/Money.java"),
                unit("src/main/java/shop/util/Strings.java"),
                unit("src/main/java/audit/Log.java"),
                unit("src/main/java/Main.java"),
            ],
        )
    }

    #[test]
    fn test_index_lookup() {
        let index = index();
        assert_eq!(index.len(), 6);
        assert_eq!(index.lookup("shop.Cart"), Some("src/main/java/shop/Cart.java"));
        assert_eq!(index.lookup_in_package("", "Main"), Some("src/main/java/Main.java"));
        assert_eq!(
            index.resolve_qualified("shop.util.Money.Currency"),
            Some("src/main/java/shop/util/Money.java")
        );
        assert_eq!(index.resolve_qualified("java.util.List"), None);
    }

    #[test]
    fn test_imports_and_same_package() {
        let source = r#"
package shop;

import java.util.List;
import shop.util.Money;
import static shop.util.Strings.pad;

public class Cart {
    private List<Item> items;
    private Money total;
}
"#;
        let found = ImportScanner::new().scan_source(source, &index());
        let expected: BTreeSet<String> = [
            "src/main/java/shop/Cart.java",
            "src/main/java/shop/Item.java",
            "src/main/java/shop/util/Money.java",
            "src/main/java/shop/util/Strings.java",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_wildcard_import_only_used_names() {
        let source = r#"
package audit;
import shop.util.*;
class Log { Money m; }
"#;
        let found = ImportScanner::new().scan_source(source, &index());
        assert!(found.contains("src/main/java/shop/util/Money.java"));
        assert!(!found.contains("src/main/java/shop/util/Strings.java"));
    }

    #[test]
    fn test_fully_qualified_reference() {
        let source = "package shop; class Item { audit.Log log = new audit.Log(); }";
        let found = ImportScanner::new().scan_source(source, &index());
        assert!(found.contains("src/main/java/audit/Log.java"));
    }

    #[test]
    fn test_comments_and_strings_ignored() {
        let source = r#"
package audit;
// uses shop.Cart
/* shop.Item
   shop.util.Money */
class Log { String s = "shop.Cart"; char c = '"'; String t = """
    shop.Item
    """; }
"#;
        let found = ImportScanner::new().scan_source(source, &index());
        assert!(found.iter().all(|p| p == "src/main/java/audit/Log.java"), "{found:?}");
    }

    #[test]
    fn test_extract_excludes_self() {
        let tmp = tempfile::TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let path = tmp.path().join("src/main/java/shop/Cart.java");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "package shop; class Cart { Cart next; Item item; }").unwrap();

        let found = ImportScanner::new()
            .extract(&layout, &unit("src/main/java/shop/Cart.java"), &index())
            .unwrap();
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["src/main/java/shop/Item.java".to_string()]
        );
    }

    #[test]
    fn test_extract_reads_non_utf8_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let path = tmp.path().join("src/main/java/shop/Cart.java");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        // Latin-1 comment
        std::fs::write(&path, b"package shop;\n// Gr\xf6\xdfe\nclass Cart { Item item; }\n").unwrap();

        let found = ImportScanner::new()
            .extract(&layout, &unit("src/main/java/shop/Cart.java"), &index())
            .unwrap();
        assert!(found.contains("src/main/java/shop/Item.java"));
    }
}
