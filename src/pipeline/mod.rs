//! Coverage aggregation pipeline
//!
//! Discovery, an optional compile check, the bounded coverage pass, merge,
//! HTML rendering and statistics, in that order. Setup failures abort the
//! run; failures of individual work items are logged and left out.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::discovery::{Discovery, SuiteDiscoverer};
use crate::executor::{BoundedExecutor, CompileReport, CoverageRun, CoverageRunner, Toolchain};
use crate::models::DiscoveryStrategy;
use crate::profile::{calculate_statistics, merge_profiles, MergeSummary, ProfileStatistics};
use crate::results::{RunRecord, RunStore};
use crate::utils::timer::Stopwatch;

/// Everything a completed run produced
#[derive(Clone, Debug, Serialize)]
pub struct PipelineReport {
    pub discovery: Discovery,
    pub compile: Option<CompileReport>,
    pub coverage: CoverageRun,
    pub merge: MergeSummary,
    pub merged_profile: PathBuf,
    pub html_report: Option<PathBuf>,
    pub statistics: ProfileStatistics,
    /// Phase durations in milliseconds
    pub phases: Vec<(String, u64)>,
    /// Location of the stored run summary, if it could be written
    pub summary_path: Option<PathBuf>,
}

/// Runs the full pipeline for one configuration
pub struct Pipeline {
    config: Configuration,
    toolchain: Arc<dyn Toolchain>,
}

impl Pipeline {
    pub fn new(config: Configuration, toolchain: Arc<dyn Toolchain>) -> Self {
        Self { config, toolchain }
    }

    pub async fn run(&self) -> Result<PipelineReport> {
        let started_at = Utc::now();
        let mut stopwatch = Stopwatch::new();
        let resolved = self.resolve()?;
        let config = &resolved;
        info!("Writing coverage reports to {}", config.report_dir.display());

        let discoverer =
            SuiteDiscoverer::new(config.strategy).with_suffix(config.test_suffix.clone());
        let test_dir = config.resolved_test_dir();
        let discovery = discoverer.discover(&config.target_root, Some(&test_dir))?;
        stopwatch.lap("discovery");

        if discovery.is_empty() {
            match config.strategy {
                DiscoveryStrategy::Nested => bail!(
                    "No test suites found in {}",
                    config.target_root.display()
                ),
                DiscoveryStrategy::Flat => {
                    bail!("No test files found in {}", test_dir.display())
                }
            }
        }
        info!(
            "Found {} work items ({} candidates, {} skipped)",
            discovery.work_items.len(),
            discovery.candidates,
            discovery.skipped.len()
        );

        let runner = CoverageRunner::new(self.toolchain.clone(), &config.report_dir)
            .with_mode(config.coverage_mode)
            .with_min_profile_bytes(config.min_profile_bytes)
            .with_executor(
                BoundedExecutor::new(config.max_concurrency).with_timeout(config.timeout_secs),
            );

        let compile = match config.strategy {
            DiscoveryStrategy::Flat => {
                let executor = BoundedExecutor::new(config.compile_concurrency)
                    .with_timeout(config.timeout_secs);
                let report = runner
                    .check_compiles(discovery.work_items.clone(), &config.target_root, &executor)
                    .await;
                info!(
                    "Compiled {}/{} test files successfully.",
                    report.compiled, report.total
                );
                stopwatch.lap("compile");
                Some(report)
            }
            DiscoveryStrategy::Nested => None,
        };

        let coverage = runner.collect(discovery.coverage_items()).await;
        stopwatch.lap("coverage");

        if coverage.accepted.is_empty() {
            bail!("No coverage data collected from any tests.");
        }

        let merged_profile = config.merged_profile_path();
        let merge = merge_profiles(&coverage.accepted, &merged_profile)
            .with_context(|| format!("Error merging coverage profiles into {}", merged_profile.display()))?;
        if merge.merged.is_empty() {
            bail!("No valid coverage profiles to merge.");
        }
        info!(
            "Merged {} coverage profiles into {}",
            merge.merged.len(),
            merged_profile.display()
        );
        stopwatch.lap("merge");

        let html_report = if config.render_html {
            let html = config.html_report_path();
            let output = self
                .toolchain
                .render_html(&merged_profile, &html)
                .await
                .context("Error generating HTML report")?;
            if !output.success() {
                bail!(
                    "Error generating HTML report: {}",
                    output.describe_failure("cover")
                );
            }
            info!("HTML coverage report generated: {}", html.display());
            Some(html)
        } else {
            debug!("HTML rendering disabled");
            None
        };

        let statistics = calculate_statistics(&merged_profile)
            .with_context(|| format!("Error calculating statistics for {}", merged_profile.display()))?;
        stopwatch.lap("report");

        debug!("Phase timings:\n{}", stopwatch.format());
        info!("Pipeline completed in {}ms", stopwatch.total().as_millis());

        let phases = stopwatch.lap_millis();
        let record = RunRecord::new(&config.target_root, started_at)
            .with_config(config)
            .with_phases(&phases)
            .with_results(coverage.results.clone())
            .with_stats(&merged_profile, statistics.overall);
        let summary_path = match RunStore::new(&config.report_dir).save(&record) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to store run summary: {:#}", e);
                None
            }
        };

        Ok(PipelineReport {
            discovery,
            compile,
            coverage,
            merge,
            merged_profile,
            html_report,
            statistics,
            phases,
            summary_path,
        })
    }

    /// Check the target and create the report directory, then make both
    /// absolute. Toolchain invocations run inside suite directories, so no
    /// relative path may leak past this point.
    fn resolve(&self) -> Result<Configuration> {
        let config = &self.config;
        if !config.target_root.is_dir() {
            bail!("Target directory {} does not exist.", config.target_root.display());
        }
        let target_root = config.target_root.canonicalize().with_context(|| {
            format!("Error resolving target directory {}", config.target_root.display())
        })?;

        std::fs::create_dir_all(&config.report_dir).with_context(|| {
            format!("Error creating report directory {}", config.report_dir.display())
        })?;
        let report_dir = config.report_dir.canonicalize().with_context(|| {
            format!("Error resolving report directory {}", config.report_dir.display())
        })?;

        Ok(Configuration {
            target_root,
            report_dir,
            ..config.clone()
        })
    }
}
