//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Coverage aggregation across many test suites
#[derive(Parser, Debug)]
#[command(name = "covagg")]
#[command(version)]
#[command(about = "Run test suites with coverage, merge the profiles and report statistics")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover suites, collect coverage, merge and report
    Run(RunArgs),

    /// List the work items a run would execute
    Discover(DiscoverArgs),

    /// Merge existing coverage profiles
    Merge(MergeArgs),

    /// Show statistics of a coverage profile
    Stats(StatsArgs),

    /// Configuration management
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Root directory holding the suites (nested) or the project (flat)
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// Report directory [default: <target>-coverage-report]
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Discovery strategy (nested, flat)
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Test directory relative to the target (flat strategy)
    #[arg(long)]
    pub test_dir: Option<PathBuf>,

    /// Maximum concurrent coverage runs
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Maximum concurrent compile checks (flat strategy)
    #[arg(long)]
    pub compile_concurrency: Option<usize>,

    /// Coverage mode (set, count, atomic)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Per-invocation timeout in seconds (0 disables)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Minimum size of a usable profile in bytes
    #[arg(long)]
    pub min_profile_bytes: Option<u64>,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Skip HTML report rendering
    #[arg(long)]
    pub no_html: bool,
}

/// Arguments for discover command
#[derive(Parser, Debug)]
pub struct DiscoverArgs {
    /// Root directory to scan
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// Discovery strategy (nested, flat)
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Test directory relative to the target (flat strategy)
    #[arg(long)]
    pub test_dir: Option<PathBuf>,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments for merge command
#[derive(Parser, Debug)]
pub struct MergeArgs {
    /// Profiles to merge, in order
    #[arg(required = true)]
    pub profiles: Vec<PathBuf>,

    /// Merged profile destination
    #[arg(short, long)]
    pub output: PathBuf,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for stats command
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Coverage profile to analyze
    pub profile: PathBuf,

    /// Fail on malformed counts instead of skipping them
    #[arg(long)]
    pub strict: bool,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for config management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example config file
    Init {
        /// Destination path
        #[arg(default_value = "covagg.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List supported environment variables
    Env,
}
