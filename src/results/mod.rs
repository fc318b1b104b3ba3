//! Run summary persistence
//!
//! Stores a JSON record and a CSV table of each pipeline run in the report
//! directory.

mod storage;

pub use storage::{EnvironmentInfo, ExportFormat, RunRecord, RunStore, RUN_RESULTS_CSV, RUN_SUMMARY_JSON};
