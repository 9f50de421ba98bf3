//! Source inventory: every `.java` file under the source roots

use crate::error::{BuildError, Result};
use crate::layout::{ProjectLayout, SourceRole};
use crate::timestamp::modified_millis;
use tracing::debug;
use walkdir::WalkDir;

/// Managed source file extension
pub const SOURCE_EXTENSION: &str = "java";

/// A source file as it exists on disk right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Project-relative, `/`-separated path
    pub path: String,
    /// Source root the file belongs to
    pub role: SourceRole,
    /// Modification time in milliseconds since the Unix epoch
    pub last_modified: i64,
}

impl SourceUnit {
    /// Path relative to its own source root, without extension
    /// (`com/acme/Widget` for `src/main/java/com/acme/Widget.java`).
    pub fn qualified_stem(&self, layout: &ProjectLayout) -> Option<String> {
        let root = crate::layout::to_slash(layout.source_root(self.role));
        let rest = self.path.strip_prefix(&root)?.trim_start_matches('/');
        rest.strip_suffix(".java").map(str::to_string)
    }

    /// Fully qualified class name implied by the file location.
    pub fn class_name(&self, layout: &ProjectLayout) -> Option<String> {
        self.qualified_stem(layout).map(|stem| stem.replace('/', "."))
    }
}

/// Enumerate the source units of both roots.
///
/// Main units come first, then test units, each sorted by path. A root that
/// does not exist contributes nothing; a root that cannot be walked is an
/// error.
pub fn scan(layout: &ProjectLayout) -> Result<Vec<SourceUnit>> {
    let mut units = Vec::new();
    for role in SourceRole::ALL {
        let mut found = scan_root(layout, role)?;
        found.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Found {} {} source file(s)", found.len(), role);
        units.extend(found);
    }
    Ok(units)
}

fn scan_root(layout: &ProjectLayout, role: SourceRole) -> Result<Vec<SourceUnit>> {
    let root = layout.root().join(layout.source_root(role));
    if !root.exists() {
        debug!("Source root {} does not exist", root.display());
        return Ok(Vec::new());
    }

    let mut units = Vec::new();
    let walker = WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| {
            layout
                .relative(entry.path())
                .is_none_or(|rel| !layout.is_output(std::path::Path::new(&rel)))
        });

    for entry in walker {
        let entry = entry.map_err(|e| BuildError::UnreadableRoot {
            path: root.clone(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(|s| s.to_str()) != Some(SOURCE_EXTENSION)
        {
            continue;
        }

        let Some(path) = layout.relative(entry.path()) else {
            continue;
        };
        units.push(SourceUnit {
            path,
            role,
            last_modified: modified_millis(entry.path())?,
        });
    }

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &std::path::Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "class X {}").unwrap();
    }

    #[test]
    fn test_scan_orders_main_before_test() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/test/java/a/ATest.java");
        touch(tmp.path(), "src/main/java/b/B.java");
        touch(tmp.path(), "src/main/java/a/A.java");
        touch(tmp.path(), "src/main/java/a/notes.txt");

        let layout = ProjectLayout::new(tmp.path());
        let units = scan(&layout).unwrap();
        let paths: Vec<_> = units.iter().map(|u| u.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "src/main/java/a/A.java",
                "src/main/java/b/B.java",
                "src/test/java/a/ATest.java",
            ]
        );
        assert_eq!(units[2].role, SourceRole::Test);
    }

    #[test]
    fn test_scan_skips_output_area() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/A.java");
        touch(tmp.path(), "src/out/Generated.java");

        let layout = ProjectLayout::new(tmp.path())
            .with_sources("src", "test")
            .with_output("src/out");
        let units = scan(&layout).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].path, "src/A.java");
    }

    #[test]
    fn test_missing_roots_are_empty() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        assert!(scan(&layout).unwrap().is_empty());
    }

    #[test]
    fn test_class_name() {
        let layout = ProjectLayout::new("/p");
        let unit = SourceUnit {
            path: "src/main/java/com/acme/Widget.java".into(),
            role: SourceRole::Main,
            last_modified: 0,
        };
        assert_eq!(unit.class_name(&layout).as_deref(), Some("com.acme.Widget"));
    }

    #[test]
    fn test_scan_with_relative_root() {
        let tmp = tempfile::tempdir_in(".").unwrap();
        touch(tmp.path(), "src/main/java/shop/Cart.java");
        let name = tmp.path().file_name().unwrap();

        let layout = ProjectLayout::new(name);
        let units = scan(&layout).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].path, "src/main/java/shop/Cart.java");
        assert_eq!(units[0].qualified_stem(&layout).as_deref(), Some("shop/Cart"));
    }
}
