//! Test execution collaborator trait and its request/response types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ExecutionMode, ProjectKind};

/// Wall-clock ceiling for one test run.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Wall-clock ceiling for dependency installation.
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Interpreter environment prepared for a local run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeEnv {
    /// Isolated Python interpreter, when a virtualenv was created.
    pub python: Option<PathBuf>,
}

impl RuntimeEnv {
    /// The ambient interpreter.
    pub fn ambient() -> Self {
        Self::default()
    }

    pub fn is_isolated(&self) -> bool {
        self.python.is_some()
    }
}

/// One test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunRequest {
    /// Local checkout.
    pub repo_path: PathBuf,
    /// Clone URL, used by remote executors.
    pub repo_url: String,
    pub branch: String,
    pub project_kind: ProjectKind,
    pub env: RuntimeEnv,
    pub timeout: Duration,
}

/// Merged output of one test run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionOutput {
    /// stdout followed by stderr. Empty on timeout or transport failure.
    pub output: String,
    pub timed_out: bool,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl ExecutionOutput {
    pub fn completed(output: String, exit_code: Option<i32>, duration: Duration) -> Self {
        Self {
            output,
            timed_out: false,
            exit_code,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Output for a run that hit its ceiling; partial output is discarded.
    pub fn timed_out(duration: Duration) -> Self {
        Self {
            output: String::new(),
            timed_out: true,
            exit_code: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Output for a run that could not be started or reached.
    pub fn unavailable(duration: Duration) -> Self {
        Self {
            duration_ms: duration.as_millis() as u64,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.output.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Executor trait
// ---------------------------------------------------------------------------

/// Runs install and test commands for a checkout, locally or remotely.
///
/// Neither method fails: preparation degrades to the ambient interpreter and
/// test runs degrade to empty output.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    /// Build an isolated environment and install dependencies (best-effort).
    async fn prepare(&self, repo: &Path, kind: ProjectKind) -> RuntimeEnv;

    async fn run_tests(&self, request: &TestRunRequest) -> ExecutionOutput;
}
