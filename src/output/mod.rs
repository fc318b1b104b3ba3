//! Output formatting module
//!
//! Renders statistics, run reports, merge summaries and discovery listings.

mod formatter;

pub use formatter::{OutputFormat, ReportFormatter};
