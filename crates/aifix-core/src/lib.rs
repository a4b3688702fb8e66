//! aifix Core Library
//!
//! Failure classification, rule-based source fixes and the repair loop that
//! ties them to version control and test execution.

pub mod classifier;
pub mod config;
pub mod domain;
pub mod events;
pub mod executor;
pub mod fakes;
pub mod fixer;
pub mod git;
pub mod heartbeat;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod reporting;
pub mod telemetry;
pub mod vcs;

pub use domain::{
    commit_message_for, detect_project_kind, AifixError, ExecutionMode, FailureKind,
    FailureRecord, FixOutcome, FixStatus, ProjectDetection, ProjectKind, Result, RunReport,
    RunStatus, StopReason,
};

pub use classifier::{classify, match_pattern, resolve_in_repo, CATALOG};
pub use config::AgentConfig;
pub use events::{
    ChannelSink, NoopSink, ProgressEvent, ProgressSink, ProgressStatus, TracingSink,
};
pub use executor::{ExecutionOutput, RuntimeEnv, TestExecutor, TestRunRequest};
pub use fixer::{dispatch, AppliedFix, FixEngine};
pub use git::GitCli;
pub use heartbeat::Heartbeat;
pub use orchestrator::{RepairConfig, RepairOrchestrator};
pub use reporting::{read_run_report, render_summary_md, write_run_report};
pub use vcs::{format_branch_name, VersionControl};

pub use metrics::METRICS;
pub use obs::{
    emit_best_effort_failure, emit_fix_applied, emit_fix_failed, emit_run_finished,
    emit_run_started, RunSpan,
};
pub use telemetry::init_tracing;

/// aifix version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
