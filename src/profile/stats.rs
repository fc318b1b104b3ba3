//! Statement coverage statistics
//!
//! The per-profile percentage used while collecting fails on malformed
//! counts and on totals that overflow. Aggregate statistics skip such lines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::models::{AggregateStats, CoverageProfile, CoverageRecord};

use super::reader::ProfileReader;
use super::record::Leniency;
use super::ProfileError;

/// Aggregate statistics plus a per-file breakdown
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStatistics {
    pub overall: AggregateStats,
    pub files: BTreeMap<String, AggregateStats>,
    pub records: usize,
}

impl ProfileStatistics {
    /// Statistics of a profile already held in memory. Fails if the totals
    /// overflow.
    pub fn from_profile(profile: &CoverageProfile) -> Result<Self, ProfileError> {
        let mut stats = Self::default();
        for record in &profile.records {
            stats.push(record, Leniency::Strict)?;
        }
        Ok(stats)
    }

    /// Fold one record in. A record that would overflow the totals is an
    /// error when strict and skipped otherwise.
    fn push(&mut self, record: &CoverageRecord, leniency: Leniency) -> Result<(), ProfileError> {
        let Some(overall) = self.overall.checked_add(record) else {
            if leniency == Leniency::Strict {
                return Err(ProfileError::CountOverflow {
                    position: record.position(),
                });
            }
            warn!("Statement totals overflow at {}. Skipping.", record.position());
            return Ok(());
        };

        self.overall = overall;
        self.files
            .entry(record.file_path.clone())
            .or_default()
            .add(record);
        self.records += 1;
        Ok(())
    }

    pub fn percentage(&self) -> f64 {
        self.overall.percentage()
    }

    /// Files sorted by coverage, lowest first
    pub fn least_covered(&self, limit: usize) -> Vec<(&str, &AggregateStats)> {
        let mut files: Vec<_> = self
            .files
            .iter()
            .map(|(name, stats)| (name.as_str(), stats))
            .collect();
        files.sort_by(|a, b| a.1.percentage().total_cmp(&b.1.percentage()));
        files.truncate(limit);
        files
    }
}

/// Lenient statistics over a merged or single profile.
///
/// The first line is skipped whatever it contains.
pub fn calculate_statistics(path: impl AsRef<Path>) -> Result<ProfileStatistics, ProfileError> {
    let path = path.as_ref();
    let stats = accumulate(path, Leniency::Lenient)?;

    debug!(
        "{}: {} records, {}/{} statements covered",
        path.display(),
        stats.records,
        stats.overall.covered_statements,
        stats.overall.total_statements
    );

    Ok(stats)
}

/// Strict coverage percentage of a single profile
pub fn calculate_coverage_percentage(path: impl AsRef<Path>) -> Result<f64, ProfileError> {
    Ok(accumulate(path.as_ref(), Leniency::Strict)?.percentage())
}

fn accumulate(path: &Path, leniency: Leniency) -> Result<ProfileStatistics, ProfileError> {
    let mut reader = ProfileReader::open(path)?;
    if let Some(first) = reader.next_line() {
        first?;
    }

    let mut stats = ProfileStatistics::default();
    while let Some(record) = reader.next_record(leniency) {
        stats.push(&record?, leniency)?;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_statement_arithmetic() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "p.out",
            "mode: atomic\nf.go:1.1,2.2 3 1\nf.go:3.1,4.2 5 0\n",
        );

        let stats = calculate_statistics(&path).unwrap();
        assert_eq!(stats.overall.total_statements, 8);
        assert_eq!(stats.overall.covered_statements, 3);
        assert_eq!(format!("{:.2}", stats.percentage()), "37.50");
        assert_eq!(stats.records, 2);

        let pct = calculate_coverage_percentage(&path).unwrap();
        assert_eq!(format!("{pct:.2}"), "37.50");
    }

    #[test]
    fn test_header_only_profile() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "p.out", "mode: set\n");

        let stats = calculate_statistics(&path).unwrap();
        assert_eq!(stats.overall.total_statements, 0);
        assert_eq!(format!("{:.2}", stats.percentage()), "0.00");
        assert_eq!(calculate_coverage_percentage(&path).unwrap(), 0.0);
    }

    #[test]
    fn test_first_line_skipped_unconditionally() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "p.out", "f.go:1.1,2.2 100 1\nf.go:3.1,4.2 2 1\n");

        let stats = calculate_statistics(&path).unwrap();
        assert_eq!(stats.overall.total_statements, 2);
    }

    #[test]
    fn test_leniency_split() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "p.out",
            "mode: count\nf.go:1.1,2.2 3 1\nf.go:3.1,4.2 three 1\ng.go:1.1,2.2 1 0\n",
        );

        let stats = calculate_statistics(&path).unwrap();
        assert_eq!(stats.overall.total_statements, 4);
        assert_eq!(stats.overall.covered_statements, 3);

        assert!(matches!(
            calculate_coverage_percentage(&path),
            Err(ProfileError::InvalidCount { line: 3, .. })
        ));
    }

    #[test]
    fn test_per_file_breakdown() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "p.out",
            "mode: set\na.go:1.1,2.2 4 1\nb.go:1.1,2.2 4 0\nb.go:3.1,4.2 4 1\n",
        );

        let stats = calculate_statistics(&path).unwrap();
        assert_eq!(stats.files.len(), 2);
        assert_eq!(stats.files["b.go"].total_statements, 8);

        let worst = stats.least_covered(1);
        assert_eq!(worst[0].0, "b.go");
    }

    #[test]
    fn test_from_profile_matches_file_statistics() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "p.out",
            "mode: count\na.go:1.1,2.2 2 5\nb.go:1.1,2.2 6 0\n",
        );

        let profile = crate::profile::read_profile(&path, Leniency::Strict).unwrap();
        let in_memory = ProfileStatistics::from_profile(&profile).unwrap();
        assert_eq!(in_memory, calculate_statistics(&path).unwrap());
        assert_eq!(format!("{:.2}", in_memory.percentage()), "25.00");
    }

    #[test]
    fn test_overflowing_totals() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "p.out",
            "mode: set\nf.go:1.1,2.2 9223372036854775807 1\nf.go:3.1,4.2 2 1\ng.go:1.1,2.2 0 0\n",
        );

        let stats = calculate_statistics(&path).unwrap();
        assert_eq!(stats.overall.total_statements, i64::MAX);
        assert_eq!(stats.overall.covered_statements, i64::MAX);
        assert_eq!(stats.records, 2);
        assert_eq!(stats.files["f.go"].total_statements, i64::MAX);

        assert!(matches!(
            calculate_coverage_percentage(&path),
            Err(ProfileError::CountOverflow { ref position }) if position == "f.go:3.1,4.2"
        ));

        let profile = crate::profile::read_profile(&path, Leniency::Strict).unwrap();
        assert!(ProfileStatistics::from_profile(&profile).is_err());
    }

    #[test]
    fn test_negative_counts_contribute() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "p.out",
            "mode: count\nf.go:1.1,2.2 5 -1\nf.go:3.1,4.2 3 2\n",
        );

        let stats = calculate_statistics(&path).unwrap();
        assert_eq!(stats.records, 2);
        assert_eq!(stats.overall.total_statements, 8);
        assert_eq!(stats.overall.covered_statements, 3);
        assert_eq!(format!("{:.2}", calculate_coverage_percentage(&path).unwrap()), "37.50");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            calculate_statistics(dir.path().join("nope.out")),
            Err(ProfileError::Open { .. })
        ));
    }
}
