//! Environment variable configuration
//!
//! Provides `COVAGG_*` overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "COVAGG";

/// Configuration read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Target root from COVAGG_TARGET
    pub target: Option<String>,
    /// Report directory from COVAGG_REPORT
    pub report: Option<String>,
    /// Discovery strategy from COVAGG_STRATEGY
    pub strategy: Option<String>,
    /// Coverage concurrency from COVAGG_CONCURRENCY
    pub concurrency: Option<usize>,
    /// Compile-check concurrency from COVAGG_COMPILE_CONCURRENCY
    pub compile_concurrency: Option<usize>,
    /// Coverage mode from COVAGG_MODE
    pub mode: Option<String>,
    /// Per-invocation timeout from COVAGG_TIMEOUT
    pub timeout: Option<u64>,
    /// Minimum profile size from COVAGG_MIN_PROFILE_BYTES
    pub min_profile_bytes: Option<u64>,
    /// Toolchain binary from COVAGG_GO
    pub go_binary: Option<String>,
    /// Config file from COVAGG_CONFIG
    pub config_file: Option<String>,
    /// Log level from COVAGG_LOG
    pub log_level: Option<String>,
    /// Output format from COVAGG_FORMAT
    pub format: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            target: get_env("TARGET"),
            report: get_env("REPORT"),
            strategy: get_env("STRATEGY"),
            concurrency: get_env_parse("CONCURRENCY"),
            compile_concurrency: get_env_parse("COMPILE_CONCURRENCY"),
            mode: get_env("MODE"),
            timeout: get_env_parse("TIMEOUT"),
            min_profile_bytes: get_env_parse("MIN_PROFILE_BYTES"),
            go_binary: get_env("GO"),
            config_file: get_env("CONFIG"),
            log_level: get_env("LOG"),
            format: get_env("FORMAT"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.target.is_some()
            || self.report.is_some()
            || self.strategy.is_some()
            || self.concurrency.is_some()
            || self.compile_concurrency.is_some()
            || self.mode.is_some()
            || self.timeout.is_some()
            || self.min_profile_bytes.is_some()
            || self.go_binary.is_some()
            || self.config_file.is_some()
            || self.log_level.is_some()
            || self.format.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_TARGET:              {:?}", ENV_PREFIX, self.target);
        println!("  {}_REPORT:              {:?}", ENV_PREFIX, self.report);
        println!("  {}_STRATEGY:            {:?}", ENV_PREFIX, self.strategy);
        println!("  {}_CONCURRENCY:         {:?}", ENV_PREFIX, self.concurrency);
        println!("  {}_COMPILE_CONCURRENCY: {:?}", ENV_PREFIX, self.compile_concurrency);
        println!("  {}_MODE:                {:?}", ENV_PREFIX, self.mode);
        println!("  {}_TIMEOUT:             {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_MIN_PROFILE_BYTES:   {:?}", ENV_PREFIX, self.min_profile_bytes);
        println!("  {}_GO:                  {:?}", ENV_PREFIX, self.go_binary);
        println!("  {}_CONFIG:              {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_LOG:                 {:?}", ENV_PREFIX, self.log_level);
        println!("  {}_FORMAT:              {:?}", ENV_PREFIX, self.format);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Print all COVAGG environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_TARGET               Target root directory");
    println!("  {ENV_PREFIX}_REPORT               Report directory");
    println!("  {ENV_PREFIX}_STRATEGY             Discovery layout (nested, flat)");
    println!("  {ENV_PREFIX}_CONCURRENCY          Maximum concurrent coverage runs");
    println!("  {ENV_PREFIX}_COMPILE_CONCURRENCY  Maximum concurrent compile checks");
    println!("  {ENV_PREFIX}_MODE                 Coverage mode (set, count, atomic)");
    println!("  {ENV_PREFIX}_TIMEOUT              Per-run timeout in seconds (0 = none)");
    println!("  {ENV_PREFIX}_MIN_PROFILE_BYTES    Smallest acceptable profile size");
    println!("  {ENV_PREFIX}_GO                   Go toolchain binary");
    println!("  {ENV_PREFIX}_CONFIG               Path to configuration file");
    println!("  {ENV_PREFIX}_LOG                  Log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_FORMAT               Output format (table, json, summary)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_CONCURRENCY=8");
    println!("  covagg run --target ./suites");
}
