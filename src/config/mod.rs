//! Configuration module
//!
//! Layers defaults, an optional config file, `COVAGG_*` environment variables
//! and command-line flags into one immutable [`Configuration`].

mod env;
mod file;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::discovery::DEFAULT_TEST_SUFFIX;
use crate::models::{CoverageMode, DiscoveryStrategy};

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;

/// Merged profile name for the nested layout
pub const MERGED_PROFILE: &str = "merged_coverage.out";
/// Merged profile name for the flat layout
pub const SINGLE_PROFILE: &str = "coverage.out";
/// HTML report name inside the report directory
pub const HTML_REPORT: &str = "coverage.html";

/// Settings that can live in a config file
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Discovery layout
    pub strategy: DiscoveryStrategy,

    /// Maximum concurrent coverage runs
    pub max_concurrency: usize,

    /// Maximum concurrent compile checks
    pub compile_concurrency: usize,

    /// Coverage mode requested from the toolchain
    pub coverage_mode: CoverageMode,

    /// Profiles smaller than this are treated as failures
    pub min_profile_bytes: u64,

    /// Per-invocation timeout in seconds (0 = none)
    pub timeout_secs: u64,

    /// Toolchain binary
    pub go_binary: String,

    /// File name suffix of test files
    pub test_suffix: String,

    /// Render coverage.html after merging
    pub render_html: bool,

    /// Default output format
    pub output_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            strategy: DiscoveryStrategy::Nested,
            max_concurrency: 4,
            compile_concurrency: 64,
            coverage_mode: CoverageMode::Atomic,
            min_profile_bytes: 10,
            timeout_secs: 0,
            go_binary: "go".to_string(),
            test_suffix: DEFAULT_TEST_SUFFIX.to_string(),
            render_html: true,
            output_format: "table".to_string(),
        }
    }
}

impl AppConfig {
    /// Apply environment overrides on top of these settings
    pub fn apply_env(&mut self, env: &EnvConfig) -> Result<()> {
        if let Some(strategy) = &env.strategy {
            self.strategy = DiscoveryStrategy::from_str(strategy)
                .with_context(|| format!("Invalid COVAGG_STRATEGY: {strategy}"))?;
        }
        if let Some(mode) = &env.mode {
            self.coverage_mode = CoverageMode::from_str(mode)
                .with_context(|| format!("Invalid COVAGG_MODE: {mode}"))?;
        }
        if let Some(n) = env.concurrency {
            self.max_concurrency = n;
        }
        if let Some(n) = env.compile_concurrency {
            self.compile_concurrency = n;
        }
        if let Some(secs) = env.timeout {
            self.timeout_secs = secs;
        }
        if let Some(bytes) = env.min_profile_bytes {
            self.min_profile_bytes = bytes;
        }
        if let Some(go) = &env.go_binary {
            self.go_binary = go.clone();
        }
        if let Some(format) = &env.format {
            self.output_format = format.clone();
        }
        Ok(())
    }
}

/// Resolved run configuration. Built once and never mutated.
#[derive(Clone, Debug, Serialize)]
pub struct Configuration {
    pub target_root: PathBuf,
    pub report_dir: PathBuf,
    /// Test directory for the flat layout, relative to `target_root` or absolute
    pub test_dir: Option<PathBuf>,
    pub strategy: DiscoveryStrategy,
    pub max_concurrency: usize,
    pub compile_concurrency: usize,
    pub coverage_mode: CoverageMode,
    pub min_profile_bytes: u64,
    pub timeout_secs: u64,
    pub go_binary: String,
    pub test_suffix: String,
    pub render_html: bool,
}

impl Configuration {
    /// Start from file/env settings for the given target
    pub fn builder(target_root: impl Into<PathBuf>, app: &AppConfig) -> ConfigBuilder {
        ConfigBuilder {
            target_root: target_root.into(),
            report_dir: None,
            test_dir: None,
            app: app.clone(),
        }
    }

    /// Test directory resolved against the target root
    pub fn resolved_test_dir(&self) -> PathBuf {
        match &self.test_dir {
            Some(dir) if dir.is_relative() => self.target_root.join(dir),
            Some(dir) => dir.clone(),
            None => self.target_root.clone(),
        }
    }

    pub fn merged_profile_path(&self) -> PathBuf {
        let name = match self.strategy {
            DiscoveryStrategy::Nested => MERGED_PROFILE,
            DiscoveryStrategy::Flat => SINGLE_PROFILE,
        };
        self.report_dir.join(name)
    }

    pub fn html_report_path(&self) -> PathBuf {
        self.report_dir.join(HTML_REPORT)
    }
}

/// Builder for [`Configuration`]; CLI flags are applied last
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    target_root: PathBuf,
    report_dir: Option<PathBuf>,
    test_dir: Option<PathBuf>,
    app: AppConfig,
}

impl ConfigBuilder {
    pub fn report_dir(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.report_dir = dir;
        }
        self
    }

    pub fn test_dir(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.test_dir = dir;
        }
        self
    }

    pub fn strategy(mut self, strategy: Option<DiscoveryStrategy>) -> Self {
        if let Some(s) = strategy {
            self.app.strategy = s;
        }
        self
    }

    pub fn max_concurrency(mut self, n: Option<usize>) -> Self {
        if let Some(n) = n {
            self.app.max_concurrency = n;
        }
        self
    }

    pub fn compile_concurrency(mut self, n: Option<usize>) -> Self {
        if let Some(n) = n {
            self.app.compile_concurrency = n;
        }
        self
    }

    pub fn coverage_mode(mut self, mode: Option<CoverageMode>) -> Self {
        if let Some(mode) = mode {
            self.app.coverage_mode = mode;
        }
        self
    }

    pub fn min_profile_bytes(mut self, bytes: Option<u64>) -> Self {
        if let Some(bytes) = bytes {
            self.app.min_profile_bytes = bytes;
        }
        self
    }

    pub fn timeout_secs(mut self, secs: Option<u64>) -> Self {
        if let Some(secs) = secs {
            self.app.timeout_secs = secs;
        }
        self
    }

    pub fn render_html(mut self, render: bool) -> Self {
        self.app.render_html = render;
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<Configuration> {
        if self.app.max_concurrency == 0 {
            anyhow::bail!("Concurrency must be at least 1");
        }
        if self.app.compile_concurrency == 0 {
            anyhow::bail!("Compile concurrency must be at least 1");
        }
        if self.app.test_suffix.is_empty() {
            anyhow::bail!("Test file suffix must not be empty");
        }

        let report_dir = match self.report_dir {
            Some(dir) => dir,
            None => default_report_dir(
                &self.target_root,
                self.test_dir.as_deref(),
                self.app.strategy,
            ),
        };

        Ok(Configuration {
            target_root: self.target_root,
            report_dir,
            test_dir: self.test_dir,
            strategy: self.app.strategy,
            max_concurrency: self.app.max_concurrency,
            compile_concurrency: self.app.compile_concurrency,
            coverage_mode: self.app.coverage_mode,
            min_profile_bytes: self.app.min_profile_bytes,
            timeout_secs: self.app.timeout_secs,
            go_binary: self.app.go_binary,
            test_suffix: self.app.test_suffix,
            render_html: self.app.render_html,
        })
    }
}

/// `<target>-coverage-report` (nested) or `<test-dir>-report` (flat)
pub fn default_report_dir(
    target_root: &Path,
    test_dir: Option<&Path>,
    strategy: DiscoveryStrategy,
) -> PathBuf {
    match strategy {
        DiscoveryStrategy::Nested => with_suffix(target_root, "-coverage-report"),
        DiscoveryStrategy::Flat => {
            let base = match test_dir {
                Some(dir) if dir.is_relative() => target_root.join(dir),
                Some(dir) => dir.to_path_buf(),
                None => target_root.to_path_buf(),
            };
            with_suffix(&base, "-report")
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    // Normalizes away a trailing separator.
    let normalized: PathBuf = path.components().collect();
    let mut name = normalized.into_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.compile_concurrency, 64);
        assert_eq!(config.coverage_mode, CoverageMode::Atomic);
        assert_eq!(config.min_profile_bytes, 10);
    }

    #[test]
    fn test_default_report_dir() {
        assert_eq!(
            default_report_dir(Path::new("runs/batch-a/"), None, DiscoveryStrategy::Nested),
            PathBuf::from("runs/batch-a-coverage-report")
        );
        assert_eq!(
            default_report_dir(
                Path::new("/proj"),
                Some(Path::new("gen_tests")),
                DiscoveryStrategy::Flat
            ),
            PathBuf::from("/proj/gen_tests-report")
        );
    }

    #[test]
    fn test_builder_precedence() {
        let mut app = AppConfig::default();
        app.max_concurrency = 8;

        let config = Configuration::builder("/t", &app)
            .max_concurrency(None)
            .compile_concurrency(Some(16))
            .coverage_mode(Some(CoverageMode::Count))
            .report_dir(Some(PathBuf::from("/r")))
            .build()
            .unwrap();

        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.compile_concurrency, 16);
        assert_eq!(config.coverage_mode, CoverageMode::Count);
        assert_eq!(config.merged_profile_path(), PathBuf::from("/r/merged_coverage.out"));
        assert_eq!(config.html_report_path(), PathBuf::from("/r/coverage.html"));
    }

    #[test]
    fn test_builder_rejects_zero_concurrency() {
        let result = Configuration::builder("/t", &AppConfig::default())
            .max_concurrency(Some(0))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_flat_profile_name() {
        let config = Configuration::builder("/p", &AppConfig::default())
            .strategy(Some(DiscoveryStrategy::Flat))
            .test_dir(Some(PathBuf::from("tests")))
            .build()
            .unwrap();

        assert_eq!(config.report_dir, PathBuf::from("/p/tests-report"));
        assert_eq!(config.merged_profile_path(), PathBuf::from("/p/tests-report/coverage.out"));
        assert_eq!(config.resolved_test_dir(), PathBuf::from("/p/tests"));
    }

    #[test]
    fn test_apply_env() {
        let mut app = AppConfig::default();
        let env = EnvConfig {
            mode: Some("set".to_string()),
            concurrency: Some(2),
            ..Default::default()
        };
        app.apply_env(&env).unwrap();
        assert_eq!(app.coverage_mode, CoverageMode::Set);
        assert_eq!(app.max_concurrency, 2);

        let bad = EnvConfig {
            strategy: Some("sideways".to_string()),
            ..Default::default()
        };
        assert!(app.apply_env(&bad).is_err());
    }
}
