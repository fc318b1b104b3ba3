//! Profile merging
//!
//! Concatenates accepted profiles under a single mode header.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::reader::{parse_header, ProfileReader, ProfileWriter};

/// Merge errors that abort the whole merge
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("no coverage profiles to merge")]
    NoProfiles,

    #[error("Unable to create merged coverage file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error writing to merged coverage file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a merge kept and what it dropped
#[derive(Clone, Debug, Default, Serialize)]
pub struct MergeSummary {
    /// Mode of the first accepted profile
    pub mode: Option<String>,
    /// Profiles that contributed lines, in merge order
    pub merged: Vec<PathBuf>,
    /// Profiles left out, with the reason
    pub skipped: Vec<(PathBuf, String)>,
    /// Non-blank data lines written, header excluded. Blank lines are
    /// copied through but not counted.
    pub records_written: usize,
}

impl MergeSummary {
    fn skip(&mut self, path: &Path, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("{}. Skipping {}.", reason, path.display());
        self.skipped.push((path.to_path_buf(), reason));
    }
}

/// Merge `profiles` in order into `destination`.
///
/// The first readable profile fixes the mode. Profiles with another mode,
/// no header, or that can't be opened are logged and left out. Only an empty
/// input list or a write failure is an error.
pub fn merge_profiles(profiles: &[PathBuf], destination: &Path) -> Result<MergeSummary, MergeError> {
    if profiles.is_empty() {
        return Err(MergeError::NoProfiles);
    }

    let mut writer = ProfileWriter::create(destination).map_err(|source| MergeError::Create {
        path: destination.to_path_buf(),
        source,
    })?;
    let write_err = |source| MergeError::Write {
        path: destination.to_path_buf(),
        source,
    };

    let mut summary = MergeSummary::default();

    for profile in profiles {
        let mut reader = match ProfileReader::open(profile) {
            Ok(reader) => reader,
            Err(e) => {
                summary.skip(profile, e.to_string());
                continue;
            }
        };

        let mode = match reader.read_header() {
            Ok(Some(mode)) => mode,
            Ok(None) => {
                summary.skip(profile, "Missing mode header");
                continue;
            }
            Err(e) => {
                summary.skip(profile, e.to_string());
                continue;
            }
        };

        match summary.mode.clone() {
            None => {
                writer.write_header(&mode).map_err(write_err)?;
                debug!("Merged coverage mode set to '{}' by {}", mode, profile.display());
                summary.mode = Some(mode);
            }
            Some(established) if established != mode => {
                summary.skip(
                    profile,
                    format!("Coverage mode mismatch: {mode} vs {established}"),
                );
                continue;
            }
            Some(_) => {}
        }

        summary.merged.push(profile.clone());

        while let Some(line) = reader.next_line() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("{}. Keeping lines read so far.", e);
                    break;
                }
            };

            if let Some(inner) = parse_header(&line) {
                if summary.mode.as_deref() != Some(inner.as_str()) {
                    warn!(
                        "Coverage mode changes to '{}' at line {} of {}. Dropping the rest.",
                        inner,
                        reader.line_number(),
                        profile.display()
                    );
                    break;
                }
                continue;
            }

            writer.write_line(&line).map_err(write_err)?;
            if !line.trim().is_empty() {
                summary.records_written += 1;
            }
        }
    }

    writer.finish().map_err(write_err)?;

    info!(
        "Merged {}/{} coverage profiles ({} records) into {}",
        summary.merged.len(),
        profiles.len(),
        summary.records_written,
        destination.display()
    );

    Ok(summary)
}
