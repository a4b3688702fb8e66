//! Final run report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::outcome::FixOutcome;
use super::project::ProjectKind;

/// Overall run status, derived purely from the fix outcome list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Passed,
    Partial,
    Failed,
}

impl RunStatus {
    /// `Passed` iff at least one outcome and all are fixed, `Failed` iff none
    /// are fixed, `Partial` otherwise. Suite health is not considered.
    pub fn from_outcomes(outcomes: &[FixOutcome]) -> Self {
        let fixed = outcomes.iter().filter(|o| o.is_fixed()).count();
        if fixed == 0 {
            RunStatus::Failed
        } else if fixed == outcomes.len() {
            RunStatus::Passed
        } else {
            RunStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Passed => "PASSED",
            RunStatus::Partial => "PARTIAL",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where test commands execute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Local,
    Remote,
}

/// Why the repair loop stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Classification produced no failures.
    SuitePassed,
    /// The test run hit its wall-clock ceiling and produced no output.
    ExecutionTimedOut,
    /// The executor could not run the suite (spawn or transport failure).
    ExecutionUnavailable,
    /// Failures were found but none could be fixed.
    NoFixesApplied,
    /// `max_retries` iterations were consumed.
    BudgetExhausted,
    /// Remote mode could not push the latest commits before testing.
    SyncFailed,
}

/// Aggregate result of one repair run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub repo: String,
    pub branch: String,
    pub project_kind: ProjectKind,
    pub mode: ExecutionMode,
    /// Failure count of the last iteration that classified any failures.
    pub total_failures: usize,
    pub total_fixes: usize,
    pub iterations: u32,
    pub status: RunStatus,
    pub stop_reason: StopReason,
    /// Whether the final push of the fix branch succeeded.
    pub pushed: bool,
    pub fixes: Vec<FixOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Number of failed outcomes.
    pub fn failed_fixes(&self) -> usize {
        self.fixes.len() - self.total_fixes
    }
}
