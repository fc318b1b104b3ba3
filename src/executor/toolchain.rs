//! External toolchain adapter
//!
//! The test/coverage toolchain is treated as a black box: run tests with a
//! coverage profile, compile-check a file, render a profile to HTML.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

use crate::models::CoverageMode;

/// Exit status and diagnostics of one toolchain invocation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn ok() -> Self {
        Self {
            exit_code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// One-line description of a failed invocation
    pub fn describe_failure(&self, what: &str) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("{what} failed: {status}")
        } else {
            format!("{what} failed: {status}\nStderr: {stderr}")
        }
    }
}

impl From<Output> for ToolOutput {
    fn from(output: Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Operations the pipeline needs from a test/coverage toolchain
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Toolchain name for logs
    fn name(&self) -> &str;

    /// Run the tests under `dir`, writing a coverage profile to `profile`
    async fn run_coverage(&self, dir: &Path, profile: &Path, mode: CoverageMode) -> Result<ToolOutput>;

    /// Check that `artifact` compiles, running from `workdir`
    async fn compile_check(&self, workdir: &Path, artifact: &Path) -> Result<ToolOutput>;

    /// Render `profile` as an HTML report at `output`
    async fn render_html(&self, profile: &Path, output: &Path) -> Result<ToolOutput>;
}

/// The Go toolchain (`go test`, `go build`, `go tool cover`)
#[derive(Clone, Debug)]
pub struct GoToolchain {
    binary: PathBuf,
}

impl GoToolchain {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn exec(&self, workdir: Option<&Path>, args: &[&OsStr]) -> Result<ToolOutput> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }

        debug!("Executing {} {:?}", self.binary.display(), args);

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.binary.display()))?;

        Ok(output.into())
    }
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new("go")
    }
}

#[async_trait]
impl Toolchain for GoToolchain {
    fn name(&self) -> &str {
        "go"
    }

    async fn run_coverage(&self, dir: &Path, profile: &Path, mode: CoverageMode) -> Result<ToolOutput> {
        let covermode = format!("-covermode={}", mode.name());
        self.exec(
            Some(dir),
            &[
                OsStr::new("test"),
                OsStr::new("./..."),
                OsStr::new("-coverprofile"),
                profile.as_os_str(),
                OsStr::new(&covermode),
            ],
        )
        .await
    }

    async fn compile_check(&self, workdir: &Path, artifact: &Path) -> Result<ToolOutput> {
        self.exec(
            Some(workdir),
            &[
                OsStr::new("build"),
                OsStr::new("-o"),
                OsStr::new("/dev/null"),
                artifact.as_os_str(),
            ],
        )
        .await
    }

    async fn render_html(&self, profile: &Path, output: &Path) -> Result<ToolOutput> {
        self.exec(
            None,
            &[
                OsStr::new("tool"),
                OsStr::new("cover"),
                OsStr::new("-html"),
                profile.as_os_str(),
                OsStr::new("-o"),
                output.as_os_str(),
            ],
        )
        .await
    }
}
