//! Structured observability hooks for repair run lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via `RunSpan` RAII guard
//! - Emission functions for the loop's lifecycle: start, test execution,
//!   classification, per-fix outcome, push and finish
//!
//! Events are emitted at `info!` level (`warn!` for failures). Filter with
//! `RUST_LOG`; pass `--json` to the CLI for JSON lines.

use tracing::{info, warn};

use crate::domain::{ExecutionMode, FailureKind, RunStatus, StopReason};

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
///
/// Only hold this across synchronous sections; async code should use
/// [`run_span`] with `tracing::Instrument` instead.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        Self {
            _span: run_span(run_id).entered(),
        }
    }
}

/// Span tagged with the run id.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("aifix.run", run_id = %run_id)
}

/// Emit event: run started.
///
/// ```ignore
/// emit_run_started("run-123", "https://example.com/repo.git", ExecutionMode::Local);
/// // logs: event=run.started run_id=run-123 repo=... mode=Local
/// ```
pub fn emit_run_started(run_id: &str, repo: &str, mode: ExecutionMode) {
    info!(event = "run.started", run_id = %run_id, repo = %repo, mode = ?mode);
}

/// Emit event: one test execution returned.
pub fn emit_tests_executed(
    run_id: &str,
    iteration: u32,
    duration_ms: u64,
    timed_out: bool,
    output_bytes: usize,
) {
    info!(
        event = "tests.executed",
        run_id = %run_id,
        iteration = iteration,
        duration_ms = duration_ms,
        timed_out = timed_out,
        output_bytes = output_bytes,
    );
}

pub fn emit_failures_classified(run_id: &str, iteration: u32, failures: usize) {
    info!(
        event = "failures.classified",
        run_id = %run_id,
        iteration = iteration,
        failures = failures,
    );
}

/// Emit event: a fix was written and committed.
pub fn emit_fix_applied(run_id: &str, file: &str, line: u32, kind: FailureKind, rule: &str) {
    info!(
        event = "fix.applied",
        run_id = %run_id,
        file = %file,
        line = line,
        kind = %kind,
        rule = %rule,
    );
}

/// Emit event: dispatch declined or the commit failed.
pub fn emit_fix_failed(run_id: &str, file: &str, line: u32, kind: FailureKind, reason: &str) {
    warn!(
        event = "fix.failed",
        run_id = %run_id,
        file = %file,
        line = line,
        kind = %kind,
        reason = %reason,
    );
}

pub fn emit_iteration_finished(run_id: &str, iteration: u32, fixes: usize) {
    info!(
        event = "iteration.finished",
        run_id = %run_id,
        iteration = iteration,
        fixes = fixes,
    );
}

pub fn emit_branch_pushed(run_id: &str, branch: &str, success: bool) {
    if success {
        info!(event = "branch.pushed", run_id = %run_id, branch = %branch);
    } else {
        warn!(event = "branch.push_failed", run_id = %run_id, branch = %branch);
    }
}

/// Emit event: run finished.
pub fn emit_run_finished(
    run_id: &str,
    status: RunStatus,
    stop_reason: StopReason,
    iterations: u32,
    total_fixes: usize,
    duration_ms: u64,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        status = %status,
        stop_reason = ?stop_reason,
        iterations = iterations,
        total_fixes = total_fixes,
        duration_ms = duration_ms,
    );
}

/// Emit event: a best-effort step failed (warning level).
pub fn emit_best_effort_failure(run_id: &str, step: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.best_effort_failed", run_id = %run_id, step = %step, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_run_span_create() {
        let _span = RunSpan::enter("test-run-id");
    }

    #[traced_test]
    #[test]
    fn test_run_finished_carries_stop_reason() {
        emit_run_finished(
            "run-456",
            RunStatus::Partial,
            StopReason::BudgetExhausted,
            5,
            3,
            1200,
        );
        assert!(logs_contain("run.finished"));
        assert!(logs_contain("PARTIAL"));
        assert!(logs_contain("BudgetExhausted"));
    }

    #[traced_test]
    #[test]
    fn test_fix_failed_is_logged_with_reason() {
        emit_fix_failed("run-1", "app/b.py", 9, FailureKind::Logic, "no rule applied");
        assert!(logs_contain("fix.failed"));
        assert!(logs_contain("no rule applied"));
    }

    #[traced_test]
    #[test]
    fn test_push_failure_is_distinct_event() {
        emit_branch_pushed("run-2", "TEAM_AI_FIX", false);
        assert!(logs_contain("branch.push_failed"));
    }
}
