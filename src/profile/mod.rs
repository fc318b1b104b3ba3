//! Coverage profile handling
//!
//! Line parsing, streaming reader/writer, merging and statistics for
//! text coverage profiles (`mode: <mode>` header followed by
//! `<position> <statements> <executions>` lines).

mod merge;
mod reader;
mod record;
mod stats;

use std::path::PathBuf;
use thiserror::Error;

pub use merge::{merge_profiles, MergeError, MergeSummary};
pub use reader::{parse_header, read_profile, ProfileReader, ProfileWriter};
pub use record::{parse_record, Leniency};
pub use stats::{calculate_coverage_percentage, calculate_statistics, ProfileStatistics};

/// Profile parsing and I/O errors
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Unable to open coverage profile {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading coverage profile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse {field} count '{value}' on line {line}")]
    InvalidCount {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("Coverage profile {0} has no mode header")]
    MissingHeader(PathBuf),

    #[error("Statement totals overflow at {position}")]
    CountOverflow { position: String },
}
