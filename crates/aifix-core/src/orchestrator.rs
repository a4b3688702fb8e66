//! Repair loop orchestrator.
//!
//! Drives one run: clone, detect the project kind, prepare the environment,
//! create the fix branch, then iterate {run tests, classify, fix, commit}
//! until the suite is clean, nothing could be fixed, or the budget is spent.
//!
//! Only clone, branch creation and the initial remote push are fatal. Test
//! execution problems end the loop, per-fix problems become `Failed`
//! outcomes, and pushes, installs and report persistence are best-effort.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::Instrument;
use uuid::Uuid;

use crate::classifier::classify;
use crate::config::AgentConfig;
use crate::domain::{
    detect_project_kind, AifixError, ExecutionMode, FailureRecord, FixOutcome, ProjectKind,
    Result, RunReport, RunStatus, StopReason,
};
use crate::events::{NoopSink, ProgressEvent, ProgressSink, ProgressStatus};
use crate::executor::{RuntimeEnv, TestExecutor, TestRunRequest, TEST_TIMEOUT};
use crate::fixer::{AppliedFix, FixEngine};
use crate::heartbeat::{Heartbeat, HEARTBEAT_INTERVAL};
use crate::metrics::METRICS;
use crate::obs;
use crate::reporting::write_run_report;
use crate::vcs::VersionControl;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Parameters of one repair run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairConfig {
    pub repo_url: String,
    pub team: String,
    pub leader: String,
    /// Maximum number of test/fix iterations.
    pub max_retries: u32,
    /// Where to persist the report; `None` skips persistence.
    pub results_file: Option<PathBuf>,
    pub test_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl RepairConfig {
    pub fn new(repo_url: &str, team: &str, leader: &str) -> Self {
        Self {
            repo_url: repo_url.to_string(),
            team: team.to_string(),
            leader: leader.to_string(),
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
            results_file: None,
            test_timeout: TEST_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    /// Run parameters from process configuration.
    pub fn from_agent(agent: &AgentConfig, repo_url: &str, team: &str, leader: &str) -> Self {
        Self {
            max_retries: agent.max_retries,
            results_file: Some(agent.results_file.clone()),
            test_timeout: agent.test_timeout,
            heartbeat_interval: agent.heartbeat_interval,
            ..Self::new(repo_url, team, leader)
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_results_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_file = Some(path.into());
        self
    }

    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.repo_url.trim().is_empty() {
            return Err(AifixError::InvalidConfig("repository URL is empty".to_string()));
        }
        if self.team.trim().is_empty() || self.leader.trim().is_empty() {
            return Err(AifixError::InvalidConfig(
                "team and leader names are required".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(AifixError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

/// Mutable state of one run. Created inside [`RepairOrchestrator::run`] so
/// the orchestrator itself stays immutable.
#[derive(Debug)]
struct RunContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    repo_path: PathBuf,
    branch: String,
    project_kind: ProjectKind,
    env: RuntimeEnv,
    iterations: u32,
    outcomes: Vec<FixOutcome>,
    last_failure_count: usize,
    stop_reason: StopReason,
}

impl RunContext {
    fn id(&self) -> String {
        self.run_id.to_string()
    }

    fn total_fixes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_fixed()).count()
    }
}

/// Move `record` into the coordinates produced by fixes already applied to
/// its file during this iteration.
fn shift_record(record: &FailureRecord, applied: &[AppliedFix]) -> FailureRecord {
    let line = applied
        .iter()
        .filter(|fix| fix.file == record.file)
        .fold(record.line, |line, fix| fix.shift(line));
    if line == record.line {
        record.clone()
    } else {
        record.at_line(line)
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives repair runs against injected collaborators.
pub struct RepairOrchestrator {
    config: RepairConfig,
    vcs: Arc<dyn VersionControl>,
    executor: Arc<dyn TestExecutor>,
    sink: Arc<dyn ProgressSink>,
    engine: FixEngine,
}

impl RepairOrchestrator {
    pub fn new(
        config: RepairConfig,
        vcs: Arc<dyn VersionControl>,
        executor: Arc<dyn TestExecutor>,
    ) -> Self {
        Self {
            config,
            vcs,
            executor,
            sink: Arc::new(NoopSink),
            engine: FixEngine::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    fn notify(&self, status: ProgressStatus, message: impl Into<String>) {
        self.sink.emit(ProgressEvent::new(status, message));
    }

    /// Execute one full run and return its report.
    pub async fn run(&self) -> Result<RunReport> {
        self.config.validate()?;
        let run_id = Uuid::new_v4();
        let span = obs::run_span(&run_id.to_string());
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunReport> {
        let started_at = Utc::now();
        let mode = self.executor.mode();
        let url = self.config.repo_url.as_str();
        let id = run_id.to_string();

        METRICS.inc_runs_started();
        obs::emit_run_started(&id, url, mode);
        self.notify(ProgressStatus::Info, format!("Starting repair run for {url}"));

        self.notify(ProgressStatus::Cloning, "Cloning repository...");
        let repo_path = match self.vcs.clone_repo(url).await {
            Ok(path) => path,
            Err(e) => {
                self.notify(ProgressStatus::Error, format!("Clone failed: {e}"));
                return Err(e);
            }
        };
        self.notify(ProgressStatus::Success, "Repository cloned");

        self.notify(ProgressStatus::Analyzing, "Detecting project type...");
        let detection = detect_project_kind(&repo_path);
        if detection.defaulted {
            tracing::warn!(
                event = "project.detected_by_default",
                path = %repo_path.display(),
                "no package.json or requirements.txt, assuming python"
            );
            self.notify(
                ProgressStatus::Warning,
                "No package.json or requirements.txt found, assuming a Python project",
            );
        }
        let project_kind = detection.kind;
        self.notify(
            ProgressStatus::Info,
            format!("Detected {project_kind} project"),
        );

        let env = match mode {
            ExecutionMode::Local => {
                self.notify(ProgressStatus::Installing, "Preparing environment and installing dependencies...");
                self.executor.prepare(&repo_path, project_kind).await
            }
            ExecutionMode::Remote => RuntimeEnv::ambient(),
        };

        self.notify(ProgressStatus::Info, "Creating fix branch...");
        let branch = match self
            .vcs
            .create_branch(&repo_path, &self.config.team, &self.config.leader)
            .await
        {
            Ok(branch) => branch,
            Err(e) => {
                self.notify(ProgressStatus::Error, format!("Branch setup failed: {e}"));
                return Err(e);
            }
        };
        self.notify(ProgressStatus::Success, format!("Branch ready: {branch}"));

        if mode == ExecutionMode::Remote {
            self.notify(ProgressStatus::Pushing, "Pushing branch for sandbox access...");
            if !self.vcs.push_branch(&repo_path, &branch).await {
                self.notify(ProgressStatus::Error, "Failed to push branch for sandbox access");
                return Err(AifixError::PushFailed(format!(
                    "initial push of {branch} failed; the sandbox cannot see the code"
                )));
            }
        }

        let mut ctx = RunContext {
            run_id,
            started_at,
            repo_path,
            branch,
            project_kind,
            env,
            iterations: 0,
            outcomes: Vec::new(),
            last_failure_count: 0,
            stop_reason: StopReason::BudgetExhausted,
        };

        self.iterate(&mut ctx, mode).await;
        Ok(self.finish(ctx, mode).await)
    }

    async fn iterate(&self, ctx: &mut RunContext, mode: ExecutionMode) {
        let max = self.config.max_retries;
        let id = ctx.id();

        for iteration in 1..=max {
            ctx.iterations = iteration;
            METRICS.inc_iterations();
            self.notify(
                ProgressStatus::Testing,
                format!("Running tests (iteration {iteration}/{max})..."),
            );

            if mode == ExecutionMode::Remote && !self.vcs.push_branch(&ctx.repo_path, &ctx.branch).await {
                self.notify(ProgressStatus::Error, "Failed to push branch updates for sandbox");
                ctx.stop_reason = StopReason::SyncFailed;
                break;
            }

            let request = TestRunRequest {
                repo_path: ctx.repo_path.clone(),
                repo_url: self.config.repo_url.clone(),
                branch: ctx.branch.clone(),
                project_kind: ctx.project_kind,
                env: ctx.env.clone(),
                timeout: self.config.test_timeout,
            };
            let heartbeat = Heartbeat::start(
                self.sink.clone(),
                self.config.heartbeat_interval,
                self.config.test_timeout,
            );
            let output = self.executor.run_tests(&request).await;
            heartbeat.stop().await;
            obs::emit_tests_executed(
                &id,
                iteration,
                output.duration_ms,
                output.timed_out,
                output.output.len(),
            );

            if output.timed_out {
                METRICS.inc_test_timeouts();
                self.notify(ProgressStatus::Warning, "Test execution timed out");
                ctx.stop_reason = StopReason::ExecutionTimedOut;
                break;
            }
            if output.is_empty() && output.exit_code.is_none() {
                self.notify(ProgressStatus::Error, "Test execution produced no output");
                ctx.stop_reason = StopReason::ExecutionUnavailable;
                break;
            }

            let failures = classify(&output.output, &ctx.repo_path);
            METRICS.add_failures_classified(failures.len() as u64);
            obs::emit_failures_classified(&id, iteration, failures.len());

            if failures.is_empty() {
                self.notify(ProgressStatus::Success, "All tests passed!");
                ctx.stop_reason = StopReason::SuitePassed;
                break;
            }

            ctx.last_failure_count = failures.len();
            self.notify(
                ProgressStatus::Warning,
                format!("Found {} error(s) to fix", failures.len()),
            );

            let fixed = self.fix_all(ctx, &failures).await;
            obs::emit_iteration_finished(&id, iteration, fixed);

            if fixed == 0 {
                self.notify(
                    ProgressStatus::Error,
                    "No fixes could be applied. Stopping iterations.",
                );
                ctx.stop_reason = StopReason::NoFixesApplied;
                break;
            }
            self.notify(
                ProgressStatus::Info,
                format!("Applied {fixed} fix(es) in iteration {iteration}"),
            );
        }
    }

    /// Dispatch-and-commit every record in order; returns the number fixed.
    async fn fix_all(&self, ctx: &mut RunContext, failures: &[FailureRecord]) -> usize {
        let id = ctx.id();
        let mut applied: Vec<AppliedFix> = Vec::new();
        let mut fixed = 0;

        for original in failures {
            let record = shift_record(original, &applied);
            self.notify(
                ProgressStatus::Fixing,
                format!("Fixing {} in {}:{}", record.kind, record.basename(), record.line),
            );

            let Some(fix) = self.engine.apply(&record, &ctx.repo_path) else {
                METRICS.inc_fixes_failed();
                obs::emit_fix_failed(&id, &record.file, record.line, record.kind, "no rule applied");
                ctx.outcomes.push(FixOutcome::failed(&record));
                continue;
            };

            match self.vcs.commit_fix(&ctx.repo_path, &record).await {
                Ok(message) if !message.is_empty() => {
                    METRICS.inc_fixes_applied();
                    obs::emit_fix_applied(&id, &record.file, record.line, record.kind, &fix.rule);
                    self.notify(
                        ProgressStatus::Success,
                        format!("Fixed {} in {}:{}", record.kind, record.basename(), record.line),
                    );
                    ctx.outcomes.push(FixOutcome::fixed(&record, message));
                    applied.push(fix);
                    fixed += 1;
                }
                result => {
                    let reason = match result {
                        Err(e) => e.to_string(),
                        Ok(_) => "commit produced no message".to_string(),
                    };
                    METRICS.inc_fixes_failed();
                    obs::emit_fix_failed(&id, &record.file, record.line, record.kind, &reason);
                    if let Err(e) = self.vcs.discard_changes(&ctx.repo_path, &record.file).await {
                        obs::emit_best_effort_failure(&id, "discard_changes", &e);
                    }
                    ctx.outcomes.push(FixOutcome::failed(&record));
                }
            }
        }
        fixed
    }

    async fn finish(&self, ctx: RunContext, mode: ExecutionMode) -> RunReport {
        let id = ctx.id();
        let total_fixes = ctx.total_fixes();

        let mut pushed = false;
        if total_fixes > 0 {
            self.notify(ProgressStatus::Pushing, "Pushing fixes...");
            pushed = self.vcs.push_branch(&ctx.repo_path, &ctx.branch).await;
            obs::emit_branch_pushed(&id, &ctx.branch, pushed);
            if pushed {
                self.notify(ProgressStatus::Success, format!("Branch pushed: {}", ctx.branch));
            } else {
                self.notify(ProgressStatus::Error, format!("Failed to push branch {}", ctx.branch));
            }
        } else {
            self.notify(ProgressStatus::Warning, "No fixes were applied, skipping push");
        }

        let finished_at = Utc::now();
        let report = RunReport {
            run_id: ctx.run_id,
            repo: self.config.repo_url.clone(),
            branch: ctx.branch,
            project_kind: ctx.project_kind,
            mode,
            total_failures: ctx.last_failure_count,
            total_fixes,
            iterations: ctx.iterations,
            status: RunStatus::from_outcomes(&ctx.outcomes),
            stop_reason: ctx.stop_reason,
            pushed,
            fixes: ctx.outcomes,
            started_at: ctx.started_at,
            finished_at,
        };

        let mut completed = ProgressEvent::new(
            ProgressStatus::Completed,
            format!("Run completed. Status: {}", report.status),
        );
        if let Ok(payload) = serde_json::to_value(&report) {
            completed = completed.with_payload(payload);
        }
        self.sink.emit(completed);

        if let Some(path) = &self.config.results_file {
            if let Err(e) = write_run_report(&report, path) {
                obs::emit_best_effort_failure(&id, "persist_report", &e);
            }
        }

        let duration_ms = (finished_at - report.started_at)
            .num_milliseconds()
            .max(0) as u64;
        obs::emit_run_finished(
            &id,
            report.status,
            report.stop_reason,
            report.iterations,
            report.total_fixes,
            duration_ms,
        );
        METRICS.flush();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureKind;

    #[test]
    fn test_shift_record_after_insertion() {
        let applied = vec![AppliedFix {
            file: "a.py".into(),
            rule: "initialize_name".into(),
            line: 5,
            delta: 1,
        }];
        let later = FailureRecord::new(FailureKind::Logic, "a.py", 9, "m");
        let earlier = FailureRecord::new(FailureKind::Logic, "a.py", 2, "m");
        let other = FailureRecord::new(FailureKind::Logic, "b.py", 9, "m");

        assert_eq!(shift_record(&later, &applied).line, 10);
        assert_eq!(shift_record(&earlier, &applied).line, 2);
        assert_eq!(shift_record(&other, &applied).line, 9);
    }

    #[test]
    fn test_shift_record_composes() {
        let applied = vec![
            AppliedFix {
                file: "a.py".into(),
                rule: "add_typing_import".into(),
                line: 1,
                delta: 1,
            },
            AppliedFix {
                file: "a.py".into(),
                rule: "drop_unused_import".into(),
                line: 3,
                delta: -1,
            },
        ];
        let record = FailureRecord::new(FailureKind::Logic, "a.py", 7, "m");
        assert_eq!(shift_record(&record, &applied).line, 7);
    }

    #[test]
    fn test_config_validation() {
        assert!(RepairConfig::new("u", "t", "l").validate().is_ok());
        assert!(RepairConfig::new(" ", "t", "l").validate().is_err());
        assert!(RepairConfig::new("u", "", "l").validate().is_err());
        assert!(RepairConfig::new("u", "t", "l")
            .with_max_retries(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_agent_copies_budget() {
        let agent = AgentConfig::default().with_max_retries(2);
        let config = RepairConfig::from_agent(&agent, "u", "t", "l");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.results_file, Some(PathBuf::from("results.json")));
    }
}
