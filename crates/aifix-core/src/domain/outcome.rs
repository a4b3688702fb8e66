//! Per-fix outcome records.

use serde::{Deserialize, Serialize};

use super::failure::{FailureKind, FailureRecord};

/// Whether a dispatch attempt ended in a committed fix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FixStatus {
    Fixed,
    Failed,
}

/// Result of one dispatch-and-commit attempt.
///
/// A `Fixed` outcome is only constructed after its commit exists, so the
/// audit trail never carries a fix that is missing from version control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixOutcome {
    pub file: String,
    pub line: u32,
    pub kind: FailureKind,
    /// Commit subject; empty for failed attempts.
    pub commit_message: String,
    pub status: FixStatus,
}

impl FixOutcome {
    /// Outcome for a fix whose commit was created with `commit_message`.
    pub fn fixed(record: &FailureRecord, commit_message: String) -> Self {
        Self {
            file: record.file.clone(),
            line: record.line,
            kind: record.kind,
            commit_message,
            status: FixStatus::Fixed,
        }
    }

    /// Outcome for a declined edit or a failed commit.
    pub fn failed(record: &FailureRecord) -> Self {
        Self {
            file: record.file.clone(),
            line: record.line,
            kind: record.kind,
            commit_message: String::new(),
            status: FixStatus::Failed,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.status == FixStatus::Fixed
    }
}

/// Commit subject for a fix of `record`.
pub fn commit_message_for(record: &FailureRecord) -> String {
    format!(
        "[AI-AGENT] Fixed {} error in {} line {}",
        record.kind.tag(),
        record.basename(),
        record.line
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_message_template() {
        let record = FailureRecord::new(FailureKind::TypeError, "src/app/util.py", 12, "x");
        assert_eq!(
            commit_message_for(&record),
            "[AI-AGENT] Fixed TYPE_ERROR error in util.py line 12"
        );
    }

    #[test]
    fn test_failed_outcome_has_empty_message() {
        let record = FailureRecord::new(FailureKind::Logic, "a.py", 1, "x");
        let outcome = FixOutcome::failed(&record);
        assert!(outcome.commit_message.is_empty());
        assert!(!outcome.is_fixed());
    }

    #[test]
    fn test_fixed_outcome_carries_record_fields() {
        let record = FailureRecord::new(FailureKind::Syntax, "b.py", 10, "invalid syntax");
        let outcome = FixOutcome::fixed(&record, commit_message_for(&record));
        assert!(outcome.is_fixed());
        assert_eq!(outcome.line, 10);
        assert_eq!(outcome.kind, FailureKind::Syntax);
        assert!(outcome.commit_message.starts_with("[AI-AGENT]"));
    }
}
