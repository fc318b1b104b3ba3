//! Test suite discovery
//!
//! Resolves the directory layout under the target root into work items.
//! Two layouts are supported: nested suites of numbered variants, and a
//! flat project scanned recursively for test files.

mod flat;
mod nested;

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::models::{DiscoveryStrategy, Suite, WorkItem};

pub use flat::find_test_files;
pub use nested::{find_suites, find_test_file, numeric_variants};

/// Default suffix identifying test files
pub const DEFAULT_TEST_SUFFIX: &str = "_test.go";

/// Outcome of a discovery pass
#[derive(Clone, Debug, Default, Serialize)]
pub struct Discovery {
    /// Candidate suites found (nested) or test files found (flat)
    pub candidates: usize,
    /// Resolved items, one per suite or test file
    pub work_items: Vec<WorkItem>,
    /// Candidates that yielded no work item, with the reason
    pub skipped: Vec<(PathBuf, String)>,
    /// Project-wide item used for the coverage pass in flat mode
    #[serde(skip_serializing_if = "Option::is_none")]
    project_item: Option<WorkItem>,
}

impl Discovery {
    /// Items dispatched to the coverage pass
    pub fn coverage_items(&self) -> Vec<WorkItem> {
        match &self.project_item {
            Some(item) if !self.work_items.is_empty() => vec![item.clone()],
            Some(_) => Vec::new(),
            None => self.work_items.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.work_items.is_empty()
    }
}

/// Locates work items under a root directory
#[derive(Clone, Debug)]
pub struct SuiteDiscoverer {
    strategy: DiscoveryStrategy,
    test_suffix: String,
}

impl SuiteDiscoverer {
    pub fn new(strategy: DiscoveryStrategy) -> Self {
        Self {
            strategy,
            test_suffix: DEFAULT_TEST_SUFFIX.to_string(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.test_suffix = suffix.into();
        self
    }

    /// Discover work items.
    ///
    /// `root` is the aggregation root (nested) or the project root (flat).
    /// `test_dir` is only used in flat mode. A relative `test_dir` is taken
    /// relative to `root`; it defaults to `root` itself.
    pub fn discover(&self, root: &Path, test_dir: Option<&Path>) -> Result<Discovery> {
        match self.strategy {
            DiscoveryStrategy::Nested => self.discover_nested(root),
            DiscoveryStrategy::Flat => {
                let test_dir = test_dir.map_or_else(|| root.to_path_buf(), |dir| root.join(dir));
                self.discover_flat(root, test_dir)
            }
        }
    }

    fn discover_nested(&self, root: &Path) -> Result<Discovery> {
        let suites = find_suites(root)
            .with_context(|| format!("Error finding test suites in {}", root.display()))?;

        let mut discovery = Discovery {
            candidates: suites.len(),
            ..Default::default()
        };

        for suite_root in suites {
            match self.resolve_suite(&suite_root) {
                Ok(item) => {
                    info!("Found test file: {}", item.test_artifact_path.display());
                    discovery.work_items.push(item);
                }
                Err(reason) => {
                    warn!("{}: {}. Skipping.", suite_root.display(), reason);
                    discovery.skipped.push((suite_root, reason));
                }
            }
        }

        Ok(discovery)
    }

    /// Pick the highest-numbered variant of a suite and its test file
    pub fn resolve_suite(&self, suite_root: &Path) -> std::result::Result<WorkItem, String> {
        let suite = Suite {
            root_path: suite_root.to_path_buf(),
            variant_dirs: numeric_variants(suite_root)
                .map_err(|e| format!("Error accessing subdirectories: {e}"))?,
        };

        let (id, variant) = suite
            .latest_variant()
            .ok_or_else(|| "No numerical subdirectories found".to_string())?;
        debug!("Identified highest-numbered subdirectory: {} ({})", variant.display(), id);

        match find_test_file(variant, &self.test_suffix) {
            Ok(Some(artifact)) => Ok(WorkItem::new(variant, artifact)),
            Ok(None) => Err(format!("No test file found in {}", variant.display())),
            Err(e) => Err(format!("Error finding test file in {}: {e}", variant.display())),
        }
    }

    fn discover_flat(&self, project_root: &Path, test_dir: PathBuf) -> Result<Discovery> {
        let files = find_test_files(&test_dir, &self.test_suffix)
            .with_context(|| format!("Error finding test files in {}", test_dir.display()))?;

        let work_items = files
            .into_iter()
            .map(|file| {
                let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
                WorkItem::new(dir, file)
            })
            .collect::<Vec<_>>();

        Ok(Discovery {
            candidates: work_items.len(),
            work_items,
            skipped: Vec::new(),
            project_item: Some(WorkItem::new(project_root, test_dir)),
        })
    }
}

impl Default for SuiteDiscoverer {
    fn default() -> Self {
        Self::new(DiscoveryStrategy::Nested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "package x\n").unwrap();
    }

    #[test]
    fn test_nested_discovery() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        // suite with variants, highest has a test file
        touch(&root.join("alpha/1/a_test.go"));
        touch(&root.join("alpha/12/b_test.go"));
        touch(&root.join("alpha/9/c_test.go"));
        // no numeric variants
        fs::create_dir_all(root.join("beta/draft")).unwrap();
        // highest variant lacks a test file
        touch(&root.join("gamma/1/g_test.go"));
        touch(&root.join("gamma/2/g.go"));
        // stray file at root level is not a suite
        touch(&root.join("README.md"));

        let discovery = SuiteDiscoverer::default().discover(root, None).unwrap();
        assert_eq!(discovery.candidates, 3);
        assert_eq!(discovery.work_items.len(), 1);
        assert_eq!(discovery.skipped.len(), 2);

        let item = &discovery.work_items[0];
        assert_eq!(item.suite_path, root.join("alpha/12"));
        assert_eq!(item.test_artifact_path, root.join("alpha/12/b_test.go"));
        assert_eq!(discovery.coverage_items(), discovery.work_items);
    }

    #[test]
    fn test_nested_missing_root() {
        let dir = tempdir().unwrap();
        let result = SuiteDiscoverer::default().discover(&dir.path().join("absent"), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_flat_discovery() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("tests/a_test.go"));
        touch(&root.join("tests/sub/b_test.go"));
        touch(&root.join("tests/sub/b.go"));

        let discoverer = SuiteDiscoverer::new(DiscoveryStrategy::Flat);
        let discovery = discoverer.discover(root, Some(Path::new("tests"))).unwrap();

        assert_eq!(discovery.work_items.len(), 2);
        assert_eq!(discovery.work_items[1].suite_path, root.join("tests/sub"));

        let coverage = discovery.coverage_items();
        assert_eq!(coverage.len(), 1);
        assert_eq!(coverage[0].suite_path, root);
        assert_eq!(coverage[0].test_artifact_path, root.join("tests"));
    }

    #[test]
    fn test_flat_relative_root() {
        let base = tempfile::tempdir_in(".").unwrap();
        let root = PathBuf::from(base.path().file_name().unwrap());
        touch(&root.join("tests/a_test.go"));

        let discovery = SuiteDiscoverer::new(DiscoveryStrategy::Flat)
            .discover(&root, Some(Path::new("tests")))
            .unwrap();

        assert_eq!(discovery.work_items.len(), 1);
        assert_eq!(discovery.work_items[0].test_artifact_path, root.join("tests/a_test.go"));
        assert!(discovery.work_items[0].test_artifact_path.is_file());
        assert_eq!(discovery.coverage_items()[0].test_artifact_path, root.join("tests"));
    }

    #[test]
    fn test_flat_defaults_to_root() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a_test.go"));

        let discovery = SuiteDiscoverer::new(DiscoveryStrategy::Flat)
            .discover(dir.path(), None)
            .unwrap();
        assert_eq!(discovery.work_items.len(), 1);
        assert_eq!(discovery.coverage_items()[0].test_artifact_path, dir.path());
    }

    #[test]
    fn test_flat_no_tests() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tests")).unwrap();

        let discovery = SuiteDiscoverer::new(DiscoveryStrategy::Flat)
            .discover(dir.path(), Some(Path::new("tests")))
            .unwrap();
        assert!(discovery.is_empty());
        assert!(discovery.coverage_items().is_empty());
    }

    #[test]
    fn test_custom_suffix() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("s/4/test_calc.py"));
        touch(&dir.path().join("s/4/calc_test.py"));

        let discoverer = SuiteDiscoverer::default().with_suffix("_test.py");
        let item = discoverer.resolve_suite(&dir.path().join("s")).unwrap();
        assert_eq!(item.test_artifact_path, dir.path().join("s/4/calc_test.py"));
    }
}
