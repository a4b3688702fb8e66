//! aifix domain model: failures, fix outcomes, project kinds and run reports.

pub mod error;
pub mod failure;
pub mod outcome;
pub mod project;
pub mod report;

pub use error::{AifixError, Result};
pub use failure::{FailureKind, FailureRecord};
pub use outcome::{commit_message_for, FixOutcome, FixStatus};
pub use project::{detect_project_kind, ProjectDetection, ProjectKind};
pub use report::{ExecutionMode, RunReport, RunStatus, StopReason};
