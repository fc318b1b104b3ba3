//! Coverage profile models
//!
//! Defines coverage modes, profile records and aggregate statistics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the header line that opens every coverage profile
pub const MODE_PREFIX: &str = "mode:";

/// Counting semantics used by the instrumentation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageMode {
    /// Presence only: did the block run at all
    Set,
    /// Exact execution count
    Count,
    /// Exact count, safe under concurrent increments
    Atomic,
}

impl CoverageMode {
    /// Mode name as written in the profile header
    pub fn name(&self) -> &'static str {
        match self {
            CoverageMode::Set => "set",
            CoverageMode::Count => "count",
            CoverageMode::Atomic => "atomic",
        }
    }

    /// Header line for a profile in this mode
    pub fn header(&self) -> String {
        format!("{MODE_PREFIX} {}", self.name())
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<CoverageMode> {
        match s.trim().to_lowercase().as_str() {
            "set" => Some(CoverageMode::Set),
            "count" => Some(CoverageMode::Count),
            "atomic" => Some(CoverageMode::Atomic),
            _ => None,
        }
    }
}

impl Default for CoverageMode {
    fn default() -> Self {
        CoverageMode::Atomic
    }
}

impl fmt::Display for CoverageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One instrumented code range and how many times it executed.
///
/// Counts are signed. A negative count is carried through as written and
/// never counts as covered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub file_path: String,
    pub start_pos: String,
    pub end_pos: String,
    pub statement_count: i64,
    pub execution_count: i64,
}

impl CoverageRecord {
    /// Whether the block ran at least once
    pub fn is_covered(&self) -> bool {
        self.execution_count > 0
    }

    /// Position descriptor in profile form (`file:start,end`)
    pub fn position(&self) -> String {
        if self.start_pos.is_empty() && self.end_pos.is_empty() {
            self.file_path.clone()
        } else {
            format!("{}:{},{}", self.file_path, self.start_pos, self.end_pos)
        }
    }
}

impl fmt::Display for CoverageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.position(),
            self.statement_count,
            self.execution_count
        )
    }
}

/// A parsed coverage profile
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageProfile {
    pub mode: String,
    pub records: Vec<CoverageRecord>,
}

impl CoverageProfile {
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            records: Vec::new(),
        }
    }
}

/// Statement totals across one or more profiles
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_statements: i64,
    pub covered_statements: i64,
}

impl AggregateStats {
    pub fn new(total_statements: i64, covered_statements: i64) -> Self {
        Self {
            total_statements,
            covered_statements,
        }
    }

    /// Fold one record into the totals, saturating at the integer bounds
    pub fn add(&mut self, record: &CoverageRecord) {
        self.total_statements = self.total_statements.saturating_add(record.statement_count);
        if record.is_covered() {
            self.covered_statements = self.covered_statements.saturating_add(record.statement_count);
        }
    }

    /// Totals with one more record folded in, or `None` on overflow
    pub fn checked_add(self, record: &CoverageRecord) -> Option<Self> {
        let total_statements = self.total_statements.checked_add(record.statement_count)?;
        let covered_statements = if record.is_covered() {
            self.covered_statements.checked_add(record.statement_count)?
        } else {
            self.covered_statements
        };
        Some(Self {
            total_statements,
            covered_statements,
        })
    }

    /// Covered percentage, 0 when there are no statements
    pub fn percentage(&self) -> f64 {
        if self.total_statements == 0 {
            0.0
        } else {
            (self.covered_statements as f64 / self.total_statements as f64) * 100.0
        }
    }

    pub fn uncovered_statements(&self) -> i64 {
        self.total_statements.saturating_sub(self.covered_statements)
    }
}

impl fmt::Display for AggregateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Statements: {}", self.total_statements)?;
        writeln!(f, "Covered Statements: {}", self.covered_statements)?;
        write!(f, "Coverage Percentage: {:.2}%", self.percentage())
    }
}
