//! Run summary storage
//!
//! Persists run summaries in JSON and per-item outcomes in CSV.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Configuration;
use crate::models::{AggregateStats, ExecutionResult, Outcome, RunTally};

/// JSON summary file name
pub const RUN_SUMMARY_JSON: &str = "run_summary.json";
/// CSV results file name
pub const RUN_RESULTS_CSV: &str = "run_results.csv";

/// Stored record of one pipeline run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run ID
    pub id: String,

    /// Target root that was scanned
    pub target: PathBuf,

    /// Discovery layout used
    pub strategy: String,

    /// Coverage mode requested
    pub coverage_mode: String,

    /// Coverage concurrency limit
    pub max_concurrency: usize,

    /// Timestamp when the run started
    pub started_at: DateTime<Utc>,

    /// Timestamp when the run completed
    pub completed_at: DateTime<Utc>,

    /// Execution counts
    pub tally: RunTally,

    /// Every execution, in completion order
    pub results: Vec<ExecutionResult>,

    /// Merged profile location
    pub merged_profile: PathBuf,

    /// Statistics of the merged profile
    pub stats: AggregateStats,

    /// Coverage percentage of the merged profile
    pub coverage_percentage: f64,

    /// Phase durations in milliseconds
    pub phases: BTreeMap<String, u64>,

    /// Environment info
    pub environment: EnvironmentInfo,
}

/// Environment information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Operating system
    pub os: String,

    /// Architecture
    pub arch: String,

    /// Tool version
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl RunRecord {
    /// Create a new record with a fresh ID
    pub fn new(target: impl Into<PathBuf>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: generate_run_id(),
            target: target.into(),
            strategy: String::new(),
            coverage_mode: String::new(),
            max_concurrency: 0,
            started_at,
            completed_at: Utc::now(),
            tally: RunTally::default(),
            results: Vec::new(),
            merged_profile: PathBuf::new(),
            stats: AggregateStats::default(),
            coverage_percentage: 0.0,
            phases: BTreeMap::new(),
            environment: EnvironmentInfo::default(),
        }
    }

    /// Snapshot the settings the run used
    pub fn with_config(mut self, config: &Configuration) -> Self {
        self.strategy = config.strategy.to_string();
        self.coverage_mode = config.coverage_mode.to_string();
        self.max_concurrency = config.max_concurrency;
        self
    }

    pub fn with_phases(mut self, phases: &[(String, u64)]) -> Self {
        self.phases = phases.iter().cloned().collect();
        self
    }

    /// Attach execution results and recompute the tally
    pub fn with_results(mut self, results: Vec<ExecutionResult>) -> Self {
        self.tally = RunTally::from_results(&results);
        self.results = results;
        self
    }

    /// Attach merged statistics
    pub fn with_stats(mut self, merged_profile: impl Into<PathBuf>, stats: AggregateStats) -> Self {
        self.merged_profile = merged_profile.into();
        self.coverage_percentage = stats.percentage();
        self.stats = stats;
        self.completed_at = Utc::now();
        self
    }
}

/// Generate unique run ID
fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Run summary storage rooted at a report directory
pub struct RunStore {
    dir: PathBuf,
}

impl RunStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(RUN_SUMMARY_JSON)
    }

    pub fn results_path(&self) -> PathBuf {
        self.dir.join(RUN_RESULTS_CSV)
    }

    /// Write both the JSON summary and the CSV table
    pub fn save(&self, record: &RunRecord) -> Result<PathBuf> {
        let path = self.summary_path();
        self.export(record, &path, ExportFormat::Json)?;
        self.export(record, &self.results_path(), ExportFormat::Csv)?;
        Ok(path)
    }

    /// Export a record to a file
    pub fn export(&self, record: &RunRecord, path: &Path, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Json => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                serde_json::to_writer_pretty(BufWriter::new(file), record)
                    .context("Failed to write run summary")?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;

                writer.write_record([
                    "suite_path",
                    "test_artifact",
                    "status",
                    "duration_ms",
                    "coverage_percentage",
                    "profile_or_reason",
                ])?;

                for result in &record.results {
                    let (status, detail) = match &result.outcome {
                        Outcome::Success { profile_path } => {
                            ("success", profile_path.display().to_string())
                        }
                        Outcome::Failure { reason } => ("failure", reason.clone()),
                    };
                    writer.write_record([
                        result.work_item.suite_path.display().to_string(),
                        result.work_item.test_artifact_path.display().to_string(),
                        status.to_string(),
                        result.duration_ms.to_string(),
                        result
                            .coverage_percentage
                            .map(|p| format!("{p:.2}"))
                            .unwrap_or_default(),
                        detail,
                    ])?;
                }
                writer.flush()?;
            }
        }

        info!("Wrote run results to {}", path.display());
        Ok(())
    }
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}
