//! Coverage collection runner
//!
//! Drives the toolchain over work items through a [`BoundedExecutor`] and
//! accumulates the profiles that pass validation.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::models::{profile_file_names, CoverageMode, ExecutionResult, RunTally, WorkItem};
use crate::profile::calculate_coverage_percentage;

use super::parallel::{BoundedExecutor, ExecError};
use super::toolchain::Toolchain;

/// Default minimum size of a usable profile, in bytes
pub const DEFAULT_MIN_PROFILE_BYTES: u64 = 10;

/// Results of a coverage pass
#[derive(Clone, Debug, Default, Serialize)]
pub struct CoverageRun {
    /// Every execution, in completion order
    pub results: Vec<ExecutionResult>,
    /// Validated profile paths, in completion order
    pub accepted: Vec<PathBuf>,
    pub duration_ms: u64,
}

impl CoverageRun {
    pub fn tally(&self) -> RunTally {
        RunTally::from_results(&self.results)
    }
}

/// Results of a compile-check pass
#[derive(Clone, Debug, Default, Serialize)]
pub struct CompileReport {
    pub total: usize,
    pub compiled: usize,
    pub failures: Vec<(PathBuf, String)>,
}

struct Collected {
    profile_path: PathBuf,
    percentage: Option<f64>,
}

/// Runs coverage and compile passes against a toolchain
pub struct CoverageRunner {
    toolchain: Arc<dyn Toolchain>,
    report_dir: PathBuf,
    mode: CoverageMode,
    min_profile_bytes: u64,
    executor: BoundedExecutor,
}

impl CoverageRunner {
    pub fn new(toolchain: Arc<dyn Toolchain>, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            report_dir: report_dir.into(),
            mode: CoverageMode::default(),
            min_profile_bytes: DEFAULT_MIN_PROFILE_BYTES,
            executor: BoundedExecutor::default(),
        }
    }

    pub fn with_mode(mut self, mode: CoverageMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_min_profile_bytes(mut self, bytes: u64) -> Self {
        self.min_profile_bytes = bytes;
        self
    }

    pub fn with_executor(mut self, executor: BoundedExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Run every work item with coverage and collect the usable profiles
    pub async fn collect(&self, items: Vec<WorkItem>) -> CoverageRun {
        info!(
            "Running {} suites with coverage (max {} concurrent, mode {})",
            items.len(),
            self.executor.max_concurrent(),
            self.mode
        );

        let start = Instant::now();
        let toolchain = self.toolchain.clone();
        let report_dir = self.report_dir.clone();
        let mode = self.mode;
        let min_bytes = self.min_profile_bytes;

        let names = profile_file_names(&items);
        let named = items
            .into_iter()
            .zip(names.into_iter().map(|name| report_dir.join(name)))
            .collect::<Vec<_>>();

        let completed = self
            .executor
            .run(named, move |(item, profile_path): (WorkItem, PathBuf)| {
                let toolchain = toolchain.clone();
                async move { run_one(toolchain.as_ref(), &item, profile_path, mode, min_bytes).await }
            })
            .await;

        let mut run = CoverageRun::default();

        for done in completed {
            let duration_ms = done.duration_ms();
            let (item, _) = done.item;
            let result = match done.result {
                Ok(collected) => {
                    info!("Collected coverage profile: {}", collected.profile_path.display());
                    run.accepted.push(collected.profile_path.clone());
                    let result =
                        ExecutionResult::success(item, collected.profile_path, duration_ms);
                    match collected.percentage {
                        Some(pct) => result.with_coverage(pct),
                        None => result,
                    }
                }
                Err(e) => {
                    warn!("Error running tests in {}: {}", item.suite_path.display(), e);
                    ExecutionResult::failure(item, e.to_string(), duration_ms)
                }
            };
            run.results.push(result);
        }

        run.duration_ms = start.elapsed().as_millis() as u64;
        let tally = run.tally();
        info!(
            "Coverage pass completed in {}ms - collected {}/{} profiles ({:.1}%)",
            run.duration_ms,
            tally.succeeded,
            tally.total,
            tally.success_rate()
        );

        run
    }

    /// Compile-check each test artifact from `workdir`
    pub async fn check_compiles(
        &self,
        items: Vec<WorkItem>,
        workdir: &Path,
        executor: &BoundedExecutor,
    ) -> CompileReport {
        let total = items.len();
        let toolchain = self.toolchain.clone();
        let workdir = workdir.to_path_buf();

        let completed = executor
            .run(items, move |item: WorkItem| {
                let toolchain = toolchain.clone();
                let workdir = workdir.clone();
                async move {
                    let output = toolchain
                        .compile_check(&workdir, &item.test_artifact_path)
                        .await
                        .map_err(|e| ExecError::Failed(format!("{e:#}")))?;
                    if output.success() {
                        Ok(())
                    } else {
                        Err(ExecError::Failed(output.describe_failure("compile")))
                    }
                }
            })
            .await;

        let mut report = CompileReport {
            total,
            ..Default::default()
        };
        for done in completed {
            match done.result {
                Ok(()) => report.compiled += 1,
                Err(e) => {
                    warn!("Failed to compile {}: {}", done.item.test_artifact_path.display(), e);
                    report.failures.push((done.item.test_artifact_path, e.to_string()));
                }
            }
        }
        report
    }
}

async fn run_one(
    toolchain: &dyn Toolchain,
    item: &WorkItem,
    profile_path: PathBuf,
    mode: CoverageMode,
    min_bytes: u64,
) -> Result<Collected, ExecError> {
    info!("Running {} tests in {}", toolchain.name(), item.suite_path.display());

    let output = toolchain
        .run_coverage(&item.suite_path, &profile_path, mode)
        .await
        .map_err(|e| ExecError::Failed(format!("{e:#}")))?;
    if !output.success() {
        return Err(ExecError::Failed(output.describe_failure("test run")));
    }

    validate_profile(&profile_path, min_bytes).map_err(ExecError::Failed)?;

    let percentage = match calculate_coverage_percentage(&profile_path) {
        Ok(pct) => {
            info!("Coverage for {}: {:.2}%", item, pct);
            Some(pct)
        }
        Err(e) => {
            warn!("Error calculating coverage for {}: {}", profile_path.display(), e);
            None
        }
    };

    Ok(Collected {
        profile_path,
        percentage,
    })
}

/// Check that a profile exists and is at least `min_bytes` long
pub fn validate_profile(path: &Path, min_bytes: u64) -> Result<u64, String> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| format!("Unable to stat coverage profile {}: {}", path.display(), e))?;

    let size = metadata.len();
    if size < min_bytes {
        return Err(format!(
            "Coverage profile {} is too small ({} bytes). It might be empty or malformed.",
            path.display(),
            size
        ));
    }
    Ok(size)
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::executor::ToolOutput;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Writes a canned profile unless the suite is named "fail*"
    struct FakeToolchain {
        profile: String,
        calls: Mutex<Vec<PathBuf>>,
    }

    impl FakeToolchain {
        fn new(profile: &str) -> Self {
            Self {
                profile: profile.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Toolchain for FakeToolchain {
        fn name(&self) -> &str {
            "fake"
        }

        async fn run_coverage(&self, dir: &Path, profile: &Path, _mode: CoverageMode) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(dir.to_path_buf());
            tokio::time::sleep(Duration::from_millis(5)).await;
            let name = base_name(dir);
            if name.starts_with("fail") {
                return Ok(ToolOutput::failed(1, "FAIL"));
            }
            if name == "tiny" {
                std::fs::write(profile, "mode:")?;
            } else {
                std::fs::write(profile, &self.profile)?;
            }
            Ok(ToolOutput::ok())
        }

        async fn compile_check(&self, _workdir: &Path, artifact: &Path) -> Result<ToolOutput> {
            if base_name(artifact).starts_with("broken") {
                Ok(ToolOutput::failed(2, "syntax error"))
            } else {
                Ok(ToolOutput::ok())
            }
        }

        async fn render_html(&self, _profile: &Path, _output: &Path) -> Result<ToolOutput> {
            Ok(ToolOutput::ok())
        }
    }

    fn base_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn item(root: &Path, name: &str) -> WorkItem {
        let suite = root.join(name);
        WorkItem::new(&suite, suite.join(format!("{name}_test.go")))
    }

    #[test]
    fn test_validate_profile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.out");

        assert!(validate_profile(&path, 10).is_err());

        std::fs::write(&path, "mode: set\n").unwrap();
        assert_eq!(validate_profile(&path, 10), Ok(10));
        assert!(validate_profile(&path, 11).unwrap_err().contains("too small"));
    }

    #[tokio::test]
    async fn test_collect_isolates_failures() {
        let dir = tempdir().unwrap();
        let toolchain = Arc::new(FakeToolchain::new("mode: atomic\nf.go:1.1,2.2 3 1\n"));
        let runner = CoverageRunner::new(toolchain.clone(), dir.path())
            .with_executor(BoundedExecutor::new(2));

        let items = vec![
            item(dir.path(), "a"),
            item(dir.path(), "fail1"),
            item(dir.path(), "b"),
            item(dir.path(), "fail2"),
            item(dir.path(), "tiny"),
        ];

        let run = runner.collect(items).await;
        assert_eq!(run.results.len(), 5);
        assert_eq!(run.accepted.len(), 2);
        assert_eq!(toolchain.calls.lock().unwrap().len(), 5);

        let tally = run.tally();
        assert_eq!(tally.succeeded, 2);
        assert_eq!(tally.failed, 3);

        assert!(run
            .accepted
            .contains(&dir.path().join("coverage_a_test.go.out")));

        let success = run.results.iter().find(|r| r.outcome.is_success()).unwrap();
        assert_eq!(success.coverage_percentage, Some(100.0));
    }

    #[tokio::test]
    async fn test_collect_shared_artifact_names() {
        let dir = tempdir().unwrap();
        let toolchain = Arc::new(FakeToolchain::new("mode: set\nf.go:1.1,2.2 3 1\n"));
        let runner = CoverageRunner::new(toolchain, dir.path()).with_executor(BoundedExecutor::new(2));

        let items = ["alpha", "beta"]
            .iter()
            .map(|suite| {
                let variant = dir.path().join(suite).join("1");
                WorkItem::new(&variant, variant.join("calc_test.go"))
            })
            .collect();

        let mut accepted = runner.collect(items).await.accepted;
        accepted.sort();
        assert_eq!(
            accepted,
            vec![
                dir.path().join("coverage_calc_test.go.out"),
                dir.path().join("coverage_calc_test.go_2.out"),
            ]
        );
    }

    #[tokio::test]
    async fn test_unparseable_profile_still_accepted() {
        let dir = tempdir().unwrap();
        let toolchain = Arc::new(FakeToolchain::new("mode: set\nf.go:1.1,2.2 many 1\n"));
        let runner = CoverageRunner::new(toolchain, dir.path());

        let run = runner.collect(vec![item(dir.path(), "a")]).await;
        assert_eq!(run.accepted.len(), 1);
        assert_eq!(run.results[0].coverage_percentage, None);
    }

    #[tokio::test]
    async fn test_check_compiles() {
        let dir = tempdir().unwrap();
        let runner = CoverageRunner::new(Arc::new(FakeToolchain::new("")), dir.path());

        let items = vec![
            item(dir.path(), "ok"),
            item(dir.path(), "broken"),
            item(dir.path(), "fine"),
        ];
        let report = runner
            .check_compiles(items, dir.path(), &BoundedExecutor::new(64))
            .await;

        assert_eq!(report.total, 3);
        assert_eq!(report.compiled, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].1.contains("syntax error"));
    }
}
