//! Coverage execution engine
//!
//! Bounded-concurrency dispatch of toolchain invocations and collection of
//! the resulting coverage profiles.

mod parallel;
mod runner;
mod toolchain;

pub use parallel::{BoundedExecutor, Completed, ExecError};
pub use runner::{validate_profile, CompileReport, CoverageRun, CoverageRunner};
pub use toolchain::{GoToolchain, ToolOutput, Toolchain};
