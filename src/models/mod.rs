//! Data models for coverage aggregation
//!
//! This module contains all data structures shared by discovery, execution,
//! merging and statistics.

mod coverage;
mod work;

pub use coverage::{AggregateStats, CoverageMode, CoverageProfile, CoverageRecord, MODE_PREFIX};
pub use work::{
    profile_file_names, DiscoveryStrategy, ExecutionResult, Outcome, RunTally, Suite, WorkItem,
};
