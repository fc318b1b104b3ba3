//! covagg - Coverage Aggregation Tool
//!
//! Runs many independently discovered test suites with coverage under a
//! concurrency limit, merges their profiles into one and reports statement
//! coverage.
//!
//! ## Features
//!
//! - Nested layout: one suite per directory, highest-numbered variant wins
//! - Flat layout: compile check of every test file, then one project-wide run
//! - Bounded concurrency with isolation of failing suites
//! - Mode-consistent profile merging
//! - HTML rendering through the Go toolchain
//! - Multiple output formats (Table, JSON, Summary)
//!
//! ## Usage
//!
//! ```bash
//! # Collect and merge coverage for every suite under ./suites
//! covagg run --target ./suites
//!
//! # Flat project layout with 8 concurrent runs
//! covagg run --target . --strategy flat --test-dir test --concurrency 8
//!
//! # Show what would run
//! covagg discover --target ./suites
//!
//! # Merge profiles and print statistics
//! covagg merge a.out b.out --output merged.out
//! covagg stats merged.out
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

mod cli;
mod config;
mod discovery;
mod executor;
mod models;
mod output;
mod pipeline;
mod profile;
mod results;
mod utils;

use cli::Args;
use config::{AppConfig, ConfigFile, Configuration, EnvConfig};
use discovery::SuiteDiscoverer;
use executor::GoToolchain;
use models::{CoverageMode, DiscoveryStrategy};
use output::{OutputFormat, ReportFormatter};
use pipeline::Pipeline;
use utils::logger::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(LogLevel::resolve(args.verbose, env.log_level.as_deref()));

    match args.command {
        cli::Command::Run(run_args) => {
            run_pipeline(run_args, &env, args.no_color).await?;
        }
        cli::Command::Discover(discover_args) => {
            discover(discover_args, &env, args.no_color)?;
        }
        cli::Command::Merge(merge_args) => {
            merge(merge_args, args.no_color)?;
        }
        cli::Command::Stats(stats_args) => {
            show_stats(stats_args, args.no_color)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &env)?;
        }
    }

    Ok(())
}

/// Defaults, then the config file, then `COVAGG_*` variables
fn load_app_config(config_path: Option<PathBuf>, env: &EnvConfig) -> Result<AppConfig> {
    let path = config_path.or_else(|| env.config_file.as_ref().map(PathBuf::from));
    let file = ConfigFile::load_or_default(path.as_deref())?;

    let mut app = file.app;
    app.apply_env(env)?;
    Ok(app)
}

fn resolve_target(target: Option<PathBuf>, env: &EnvConfig) -> Result<PathBuf> {
    target
        .or_else(|| env.target.as_ref().map(PathBuf::from))
        .context("No target directory given. Use --target or set COVAGG_TARGET.")
}

fn parse_strategy(strategy: Option<&str>) -> Result<Option<DiscoveryStrategy>> {
    strategy
        .map(|s| DiscoveryStrategy::from_str(s).with_context(|| format!("Unknown strategy: {s}")))
        .transpose()
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    OutputFormat::from_str(format).with_context(|| format!("Unknown output format: {format}"))
}

async fn run_pipeline(args: cli::RunArgs, env: &EnvConfig, no_color: bool) -> Result<()> {
    let app = load_app_config(args.config.clone(), env)?;
    let target = resolve_target(args.target, env)?;

    let mode = args
        .mode
        .as_deref()
        .map(|m| CoverageMode::from_str(m).with_context(|| format!("Unknown coverage mode: {m}")))
        .transpose()?;
    let format = parse_format(args.format.as_deref().unwrap_or(&app.output_format))?;

    let config = Configuration::builder(target, &app)
        .report_dir(args.report.or_else(|| env.report.as_ref().map(PathBuf::from)))
        .test_dir(args.test_dir)
        .strategy(parse_strategy(args.strategy.as_deref())?)
        .max_concurrency(args.concurrency)
        .compile_concurrency(args.compile_concurrency)
        .coverage_mode(mode)
        .min_profile_bytes(args.min_profile_bytes)
        .timeout_secs(args.timeout)
        .render_html(app.render_html && !args.no_html)
        .build()?;

    info!(
        "Aggregating coverage for {} ({} strategy, max {} concurrent)",
        config.target_root.display(),
        config.strategy,
        config.max_concurrency
    );
    debug!("Configuration: {:?}", config);

    let toolchain = Arc::new(GoToolchain::new(&config.go_binary));
    let report = Pipeline::new(config, toolchain).run().await?;

    println!("{}", ReportFormatter::for_stdout(format, no_color).format_report(&report));

    Ok(())
}

fn discover(args: cli::DiscoverArgs, env: &EnvConfig, no_color: bool) -> Result<()> {
    let app = load_app_config(args.config, env)?;
    let target = resolve_target(args.target, env)?;
    let strategy = parse_strategy(args.strategy.as_deref())?.unwrap_or(app.strategy);
    let formatter = ReportFormatter::for_stdout(parse_format(&args.format)?, no_color);

    if !target.is_dir() {
        anyhow::bail!("Target directory {} does not exist.", target.display());
    }

    let discovery = SuiteDiscoverer::new(strategy)
        .with_suffix(app.test_suffix)
        .discover(&target, args.test_dir.as_deref())?;

    println!("{}", formatter.format_discovery(&discovery));
    Ok(())
}

fn merge(args: cli::MergeArgs, no_color: bool) -> Result<()> {
    let formatter = ReportFormatter::for_stdout(parse_format(&args.format)?, no_color);

    let summary = profile::merge_profiles(&args.profiles, &args.output)
        .with_context(|| format!("Error merging coverage profiles into {}", args.output.display()))?;
    if summary.merged.is_empty() {
        anyhow::bail!("No valid coverage profiles to merge.");
    }

    println!("{}", formatter.format_merge(&summary));
    info!("Merged profile written to {}", args.output.display());
    Ok(())
}

fn show_stats(args: cli::StatsArgs, no_color: bool) -> Result<()> {
    let formatter = ReportFormatter::for_stdout(parse_format(&args.format)?, no_color);

    let stats = if args.strict {
        let parsed = profile::read_profile(&args.profile, profile::Leniency::Strict)
            .with_context(|| format!("Error parsing {}", args.profile.display()))?;
        profile::ProfileStatistics::from_profile(&parsed)
            .with_context(|| format!("Error calculating statistics for {}", args.profile.display()))?
    } else {
        profile::calculate_statistics(&args.profile)
            .with_context(|| format!("Error calculating statistics for {}", args.profile.display()))?
    };
    println!("{}", formatter.format_statistics(&stats));
    Ok(())
}

fn manage_config(args: cli::ConfigArgs, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            ConfigFile::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { config } => {
            let app = load_app_config(config, env)?;
            println!("{}", serde_yaml::to_string(&app)?);
            if env.has_any() {
                env.print_summary();
            }
        }

        cli::ConfigAction::Env => {
            config::print_env_help();
        }
    }

    Ok(())
}
