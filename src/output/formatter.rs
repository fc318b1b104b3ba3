//! Output formatters for coverage reports
//!
//! Provides JSON, Table, and summary output formats.

use serde::Serialize;
use std::io::IsTerminal;

use crate::discovery::Discovery;
use crate::models::{AggregateStats, ExecutionResult, Outcome};
use crate::pipeline::PipelineReport;
use crate::profile::{MergeSummary, ProfileStatistics};

/// Files listed in the least-covered section of a table
const LEAST_COVERED_LIMIT: usize = 10;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Report formatter
pub struct ReportFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ReportFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Formatter for output printed to stdout. Colors are dropped when
    /// `no_color` is set or stdout is not a terminal.
    pub fn for_stdout(format: OutputFormat, no_color: bool) -> Self {
        let formatter = Self::new(format);
        if no_color || !std::io::stdout().is_terminal() {
            formatter.no_color()
        } else {
            formatter
        }
    }

    fn json<T: Serialize>(&self, value: &T) -> String {
        if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }

    fn paint_percentage(&self, pct: f64) -> String {
        let text = format!("{pct:6.2}%");
        if !self.colorize {
            return text;
        }
        if pct >= 80.0 {
            format!("\x1b[32m{text}\x1b[0m")
        } else if pct >= 50.0 {
            format!("\x1b[33m{text}\x1b[0m")
        } else {
            format!("\x1b[31m{text}\x1b[0m")
        }
    }

    /// Format statistics of a single profile
    pub fn format_statistics(&self, stats: &ProfileStatistics) -> String {
        match self.format {
            OutputFormat::Table => self.format_statistics_table(stats),
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(stats),
            OutputFormat::Summary => format_stats_brief(&stats.overall),
        }
    }

    fn format_statistics_table(&self, stats: &ProfileStatistics) -> String {
        let mut output = String::new();

        output.push_str("\n═══════════════════════════════════════════════════════════════\n");
        output.push_str(" Coverage Statistics\n");
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!("{}\n", stats.overall));
        output.push_str(&format!(
            " Files: {} | Records: {} | Uncovered Statements: {}\n",
            stats.files.len(),
            stats.records,
            stats.overall.uncovered_statements()
        ));

        let least = stats.least_covered(LEAST_COVERED_LIMIT);
        if !least.is_empty() {
            output.push_str("\n Least Covered Files:\n");
            output.push_str(" ───────────────────────────────────────────────────────────\n");
            for (file, file_stats) in least {
                let bar_len = ((file_stats.percentage() / 5.0) as usize).min(20);
                output.push_str(&format!(
                    " {:40} {}{} {} ({}/{})\n",
                    truncate_left(file, 40),
                    "█".repeat(bar_len),
                    "░".repeat(20 - bar_len),
                    self.paint_percentage(file_stats.percentage()),
                    file_stats.covered_statements,
                    file_stats.total_statements
                ));
            }
            output.push_str(" ───────────────────────────────────────────────────────────\n");
        }

        output
    }

    /// Format a complete pipeline run
    pub fn format_report(&self, report: &PipelineReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_report_table(report),
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(report),
            OutputFormat::Summary => {
                let tally = report.coverage.tally();
                format!(
                    "{}/{} suites collected, {} profiles merged - {}",
                    tally.succeeded,
                    tally.total,
                    report.merge.merged.len(),
                    format_stats_brief(&report.statistics.overall)
                )
            }
        }
    }

    fn format_report_table(&self, report: &PipelineReport) -> String {
        let mut output = String::new();
        let tally = report.coverage.tally();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str("║  Coverage Run                                                ║\n");
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for result in &report.coverage.results {
            output.push_str(&format!("║  {}\n", self.format_result_line(result)));
        }

        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        if let Some(compile) = &report.compile {
            output.push_str(&format!(
                "║  Compiled: {}/{}\n",
                compile.compiled, compile.total
            ));
        }
        output.push_str(&format!(
            "║  Suites: {} | Collected: {} | Failed: {} | Rate: {:5.1}%\n",
            tally.total,
            tally.succeeded,
            tally.failed,
            tally.success_rate()
        ));
        output.push_str(&format!(
            "║  Merged: {} | Skipped: {} | Mode: {}\n",
            report.merge.merged.len(),
            report.merge.skipped.len(),
            report.merge.mode.as_deref().unwrap_or("-")
        ));
        output.push_str(&format!("║  Profile: {}\n", report.merged_profile.display()));
        if let Some(html) = &report.html_report {
            output.push_str(&format!("║  HTML: {}\n", html.display()));
        }
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output.push_str(&self.format_statistics_table(&report.statistics));

        if !report.phases.is_empty() {
            output.push_str("\n Phases:\n");
            for (phase, ms) in &report.phases {
                output.push_str(&format!("   {phase:10} {ms:>8}ms\n"));
            }
        }

        output
    }

    fn format_result_line(&self, result: &ExecutionResult) -> String {
        let status = match (&result.outcome, self.colorize) {
            (Outcome::Success { .. }, true) => "\x1b[32m✓ OK  \x1b[0m",
            (Outcome::Success { .. }, false) => "✓ OK  ",
            (Outcome::Failure { .. }, true) => "\x1b[31m✗ FAIL\x1b[0m",
            (Outcome::Failure { .. }, false) => "✗ FAIL",
        };
        let detail = match (&result.outcome, result.coverage_percentage) {
            (Outcome::Success { .. }, Some(pct)) => self.paint_percentage(pct),
            (Outcome::Success { .. }, None) => "      -".to_string(),
            (Outcome::Failure { reason }, _) => first_line(reason).to_string(),
        };

        format!(
            "{} {:40} [{:>6}ms] {}",
            status,
            truncate_left(&result.work_item.suite_path.display().to_string(), 40),
            result.duration_ms,
            detail
        )
    }

    /// Format the outcome of a merge
    pub fn format_merge(&self, summary: &MergeSummary) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(summary),
            OutputFormat::Summary => format!(
                "Merged {} profiles ({} skipped, {} records)",
                summary.merged.len(),
                summary.skipped.len(),
                summary.records_written
            ),
            OutputFormat::Table => {
                let mut output = String::new();
                output.push_str(&format!(
                    "Mode: {}\n",
                    summary.mode.as_deref().unwrap_or("-")
                ));
                for path in &summary.merged {
                    output.push_str(&format!("  ✓ {}\n", path.display()));
                }
                for (path, reason) in &summary.skipped {
                    output.push_str(&format!("  ✗ {} ({})\n", path.display(), reason));
                }
                output.push_str(&format!("Records written: {}\n", summary.records_written));
                output
            }
        }
    }

    /// Format discovered work items
    pub fn format_discovery(&self, discovery: &Discovery) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(discovery),
            OutputFormat::Summary => format!(
                "{} work items from {} candidates ({} skipped)",
                discovery.work_items.len(),
                discovery.candidates,
                discovery.skipped.len()
            ),
            OutputFormat::Table => {
                let mut output = String::new();
                for (i, item) in discovery.work_items.iter().enumerate() {
                    output.push_str(&format!(
                        "{:3}. {}\n     {}\n",
                        i + 1,
                        item.suite_path.display(),
                        item.test_artifact_path.display()
                    ));
                }
                for (path, reason) in &discovery.skipped {
                    output.push_str(&format!("  - {} skipped: {}\n", path.display(), reason));
                }
                output
            }
        }
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn format_stats_brief(stats: &AggregateStats) -> String {
    format!(
        "Coverage: {:.2}% ({}/{} statements)",
        stats.percentage(),
        stats.covered_statements,
        stats.total_statements
    )
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// Keep the tail of long paths, which is the informative part
fn truncate_left(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - (width - 1)).collect();
    format!("…{tail}")
}
