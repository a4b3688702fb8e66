//! Version-control collaborator trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{FailureRecord, Result};

/// Suffix of every fix branch.
pub const BRANCH_SUFFIX: &str = "AI_FIX";

/// Clone, branch, commit and push operations against a checkout.
///
/// Methods take the checkout path explicitly so implementations hold no
/// per-run state.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Fresh clone of `url`; any previous checkout at the target is removed.
    async fn clone_repo(&self, url: &str) -> Result<PathBuf>;

    /// Create or reuse the fix branch for `team`/`leader`; returns its name.
    async fn create_branch(&self, repo: &Path, team: &str, leader: &str) -> Result<String>;

    /// Stage `record.file` and commit it; returns the commit message.
    async fn commit_fix(&self, repo: &Path, record: &FailureRecord) -> Result<String>;

    /// Push `branch` to `origin`. Never fails; returns whether it succeeded.
    async fn push_branch(&self, repo: &Path, branch: &str) -> bool;

    async fn is_dirty(&self, repo: &Path) -> bool;

    /// Restore `file` to its committed content.
    async fn discard_changes(&self, repo: &Path, file: &str) -> Result<()>;
}

/// `{TEAM}_{LEADER}_AI_FIX`: trimmed, whitespace runs to `_`, upper-cased.
pub fn format_branch_name(team: &str, leader: &str) -> String {
    format!(
        "{}_{}_{}",
        normalize_component(team),
        normalize_component(leader),
        BRANCH_SUFFIX
    )
}

fn normalize_component(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_name_normalization() {
        assert_eq!(
            format_branch_name("Core Infra", "ana lee"),
            "CORE_INFRA_ANA_LEE_AI_FIX"
        );
    }

    #[test]
    fn test_branch_name_trims_and_collapses() {
        assert_eq!(
            format_branch_name("  red   team ", "\tbo"),
            "RED_TEAM_BO_AI_FIX"
        );
    }
}
