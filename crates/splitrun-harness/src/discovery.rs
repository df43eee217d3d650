//! Test discovery - find test case sources under the test roots

use crate::pattern::NamePattern;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A case found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCase {
    /// Dotted name derived from the root-relative path (e.g. "com.shop.LoginTest")
    pub name: String,
    /// Source file the case was found in
    pub file: PathBuf,
}

/// What discovery found under a set of roots
#[derive(Debug, Default)]
pub struct Discovery {
    /// Cases sorted by name
    pub cases: Vec<DiscoveredCase>,
    /// Entries that could not be used, with the reason
    pub problems: Vec<(PathBuf, String)>,
}

/// Discovery settings
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub roots: Vec<PathBuf>,
    /// Extensions without the leading dot
    pub extensions: Vec<String>,
    /// Patterns a file stem must match
    pub patterns: Vec<NamePattern>,
}

impl Discovery {
    /// Walk every root and collect matching files
    ///
    /// Missing roots are skipped. Unreadable entries and name collisions are
    /// recorded as problems, never as errors.
    pub fn run(options: &DiscoveryOptions) -> Self {
        let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut problems = Vec::new();

        for root in &options.roots {
            if !root.is_dir() {
                debug!(root = %root.display(), "test root does not exist, skipping");
                continue;
            }

            for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        let path = e.path().unwrap_or(root).to_path_buf();
                        warn!(path = %path.display(), error = %e, "cannot read test source entry");
                        problems.push((path, e.to_string()));
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = entry.path();
                let Some(name) = case_name(root, path, options) else {
                    continue;
                };

                if let Some(existing) = found.get(&name) {
                    let reason = format!(
                        "case '{}' is already defined by {}",
                        name,
                        existing.display()
                    );
                    warn!(path = %path.display(), %reason, "duplicate test case");
                    problems.push((path.to_path_buf(), reason));
                    continue;
                }
                found.insert(name, path.to_path_buf());
            }
        }

        let cases = found
            .into_iter()
            .map(|(name, file)| DiscoveredCase { name, file })
            .collect::<Vec<_>>();
        debug!(cases = cases.len(), problems = problems.len(), "discovery finished");

        Discovery { cases, problems }
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }
}

/// Dotted case name for a file, if the file is a test source
fn case_name(root: &Path, path: &Path, options: &DiscoveryOptions) -> Option<String> {
    let extension = path.extension()?.to_str()?;
    if !options.extensions.iter().any(|e| e == extension) {
        return None;
    }

    let stem = path.file_stem()?.to_str()?;
    if !options.patterns.iter().any(|p| p.matches(stem)) {
        return None;
    }

    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let segments: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(segments.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn options(root: &Path) -> DiscoveryOptions {
        DiscoveryOptions {
            roots: vec![root.to_path_buf()],
            extensions: vec!["java".to_string(), "kt".to_string()],
            patterns: NamePattern::parse_all(["*Test", "*Tests"]).unwrap(),
        }
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "class X {}").unwrap();
    }

    #[test]
    fn test_discover_directory() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "com/shop/auth/LoginTest.java");
        touch(dir.path(), "com/shop/auth/LoginFunctionalTest.java");
        touch(dir.path(), "com/shop/cart/CartTests.kt");
        touch(dir.path(), "com/shop/cart/CartFixtures.java");
        touch(dir.path(), "com/shop/README.md");

        let discovery = Discovery::run(&options(dir.path()));
        let names: Vec<&str> = discovery.cases.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "com.shop.auth.LoginFunctionalTest",
                "com.shop.auth.LoginTest",
                "com.shop.cart.CartTests",
            ]
        );
        assert!(discovery.problems.is_empty());
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let discovery = Discovery::run(&options(&dir.path().join("nope")));
        assert!(discovery.is_empty());
        assert!(discovery.problems.is_empty());
    }

    #[test]
    fn test_duplicate_names_across_roots_reported() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        touch(first.path(), "a/LoginTest.java");
        touch(second.path(), "a/LoginTest.kt");

        let mut opts = options(first.path());
        opts.roots.push(second.path().to_path_buf());
        let discovery = Discovery::run(&opts);

        assert_eq!(discovery.len(), 1);
        assert_eq!(discovery.cases[0].file, first.path().join("a/LoginTest.java"));
        assert_eq!(discovery.problems.len(), 1);
        assert!(discovery.problems[0].1.contains("a.LoginTest"));
    }
}
