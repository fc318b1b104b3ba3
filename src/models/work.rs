//! Work item models
//!
//! Defines discovered suites, resolved work items and execution outcomes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// How test artifacts are located under the target directory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    /// Immediate subdirectories are suites holding numbered variants
    Nested,
    /// Recursive scan for test files in a single project
    Flat,
}

impl DiscoveryStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            DiscoveryStrategy::Nested => "nested",
            DiscoveryStrategy::Flat => "flat",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<DiscoveryStrategy> {
        match s.to_lowercase().as_str() {
            "nested" | "suites" => Some(DiscoveryStrategy::Nested),
            "flat" | "project" => Some(DiscoveryStrategy::Flat),
            _ => None,
        }
    }
}

impl Default for DiscoveryStrategy {
    fn default() -> Self {
        DiscoveryStrategy::Nested
    }
}

impl fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A discovered suite before a variant is chosen
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Suite {
    pub root_path: PathBuf,
    /// Numeric variants, ascending by id
    pub variant_dirs: Vec<(u64, PathBuf)>,
}

impl Suite {
    /// Variant with the largest numeric id
    pub fn latest_variant(&self) -> Option<&(u64, PathBuf)> {
        self.variant_dirs.last()
    }
}

/// A resolved (suite, test artifact) pair ready for execution
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    /// Directory the toolchain runs in
    pub suite_path: PathBuf,
    pub test_artifact_path: PathBuf,
}

impl WorkItem {
    pub fn new(suite_path: impl Into<PathBuf>, test_artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            suite_path: suite_path.into(),
            test_artifact_path: test_artifact_path.into(),
        }
    }
}

/// Profile file names for a batch of work items, in item order.
///
/// Names derive from the sanitized artifact name. When two artifacts share
/// a name (`alpha/1/calc_test.go` and `beta/1/calc_test.go`), later items get
/// `_2`, `_3`, ... appended, so every item in the batch owns its profile.
pub fn profile_file_names(items: &[WorkItem]) -> Vec<String> {
    let mut taken = HashSet::new();
    items
        .iter()
        .map(|item| {
            let base = sanitize_filename(&item.test_artifact_path);
            let mut name = format!("coverage_{base}.out");
            let mut n = 1;
            while !taken.insert(name.clone()) {
                n += 1;
                name = format!("coverage_{base}_{n}.out");
            }
            name
        })
        .collect()
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.test_artifact_path.display())
    }
}

/// Replace every non-alphanumeric character of the file stem with `_`,
/// keeping the extension.
pub fn sanitize_filename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    format!("{name}{ext}")
}

/// Result of executing one work item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success { profile_path: PathBuf },
    Failure { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "✓",
            Outcome::Failure { .. } => "✗",
        }
    }
}

/// Work item paired with its outcome
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub work_item: WorkItem,
    pub outcome: Outcome,
    pub duration_ms: u64,
    /// Single-profile coverage, informational only
    pub coverage_percentage: Option<f64>,
}

impl ExecutionResult {
    pub fn success(work_item: WorkItem, profile_path: impl Into<PathBuf>, duration_ms: u64) -> Self {
        Self {
            work_item,
            outcome: Outcome::Success {
                profile_path: profile_path.into(),
            },
            duration_ms,
            coverage_percentage: None,
        }
    }

    pub fn failure(work_item: WorkItem, reason: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            work_item,
            outcome: Outcome::Failure {
                reason: reason.into(),
            },
            duration_ms,
            coverage_percentage: None,
        }
    }

    pub fn with_coverage(mut self, percentage: f64) -> Self {
        self.coverage_percentage = Some(percentage);
        self
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.outcome.symbol(),
            self.work_item,
            self.duration_ms
        )?;
        match &self.outcome {
            Outcome::Success { .. } => {
                if let Some(pct) = self.coverage_percentage {
                    write!(f, " - {pct:.2}%")?;
                }
            }
            Outcome::Failure { reason } => write!(f, " - {reason}")?,
        }
        Ok(())
    }
}

/// Success/failure counts over a pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTally {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunTally {
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.outcome.is_success()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename(Path::new("/a/b/my-calc.v2_test.go")),
            "my_calc_v2_test.go"
        );
        assert_eq!(sanitize_filename(Path::new("plain")), "plain");
    }

    #[test]
    fn test_profile_file_names() {
        let items = vec![WorkItem::new("/t/suite/3", "/t/suite/3/calc_test.go")];
        assert_eq!(profile_file_names(&items), vec!["coverage_calc_test.go.out"]);
    }

    #[test]
    fn test_profile_file_names_shared_artifact_name() {
        let items = vec![
            WorkItem::new("/t/alpha/1", "/t/alpha/1/calc_test.go"),
            WorkItem::new("/t/beta/1", "/t/beta/1/calc_test.go"),
            WorkItem::new("/t/gamma/4", "/t/gamma/4/calc-test.go"),
            WorkItem::new("/t/delta/2", "/t/delta/2/other_test.go"),
        ];

        let names = profile_file_names(&items);
        assert_eq!(
            names,
            vec![
                "coverage_calc_test.go.out",
                "coverage_calc_test.go_2.out",
                "coverage_calc_test.go_3.out",
                "coverage_other_test.go.out",
            ]
        );
        assert_eq!(names.iter().collect::<HashSet<_>>().len(), items.len());
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            DiscoveryStrategy::from_str("FLAT"),
            Some(DiscoveryStrategy::Flat)
        );
        assert_eq!(
            DiscoveryStrategy::from_str("nested"),
            Some(DiscoveryStrategy::Nested)
        );
        assert_eq!(DiscoveryStrategy::from_str("tree"), None);
    }

    #[test]
    fn test_tally() {
        let item = WorkItem::new("/s", "/s/a_test.go");
        let results = vec![
            ExecutionResult::success(item.clone(), "/r/a.out", 10),
            ExecutionResult::failure(item.clone(), "exit 1", 5),
            ExecutionResult::failure(item, "exit 2", 5),
        ];

        let tally = RunTally::from_results(&results);
        assert_eq!(tally.total, 3);
        assert_eq!(tally.succeeded, 1);
        assert_eq!(tally.failed, 2);
        assert!((tally.success_rate() - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_result_display() {
        let item = WorkItem::new("/s", "/s/a_test.go");
        let result = ExecutionResult::failure(item, "go test failed", 7);
        assert_eq!(result.to_string(), "✗ /s/a_test.go [7ms] - go test failed");
    }
}
