//! `git` CLI adapter for [`VersionControl`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::AgentConfig;
use crate::domain::{commit_message_for, AifixError, FailureRecord, Result};
use crate::vcs::{format_branch_name, VersionControl};

const CLEANUP_ATTEMPTS: u32 = 3;
const CLEANUP_BACKOFF: Duration = Duration::from_secs(1);

/// Runs `git` as a subprocess. Checkouts live under `workspace_dir`.
#[derive(Debug, Clone)]
pub struct GitCli {
    workspace_dir: PathBuf,
    author_name: String,
    author_email: String,
}

impl GitCli {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        let defaults = AgentConfig::default();
        Self {
            workspace_dir: workspace_dir.into(),
            author_name: defaults.git_name,
            author_email: defaults.git_email,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(&config.workspace_dir).with_identity(&config.git_name, &config.git_email)
    }

    /// Commit author used for fix commits.
    pub fn with_identity(mut self, name: &str, email: &str) -> Self {
        self.author_name = name.to_string();
        self.author_email = email.to_string();
        self
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// Run `git args...` in `dir`; returns trimmed stdout.
    async fn git(&self, dir: Option<&Path>, args: &[&str]) -> std::result::Result<String, String> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        let output = cmd
            .output()
            .await
            .map_err(|e| format!("failed to run git: {e}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn current_branch(&self, repo: &Path) -> Option<String> {
        self.git(Some(repo), &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .ok()
    }
}

/// Checkout directory name for a clone URL (`.../team/app.git` -> `app`).
pub fn repo_dir_name(url: &str) -> String {
    let tail = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or("");
    let name = tail.strip_suffix(".git").unwrap_or(tail);
    if name.is_empty() || name == "." || name == ".." {
        "repo".to_string()
    } else {
        name.to_string()
    }
}

/// Remove `path` entirely, retrying a few times for transient failures.
async fn remove_checkout(path: &Path) -> Result<()> {
    let mut last_error = None;
    for attempt in 1..=CLEANUP_ATTEMPTS {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => break,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
            Err(e) => {
                tracing::warn!(path = %path.display(), attempt, error = %e, "workspace cleanup failed");
                last_error = Some(e);
                if attempt < CLEANUP_ATTEMPTS {
                    tokio::time::sleep(CLEANUP_BACKOFF).await;
                }
            }
        }
    }
    if tokio::fs::try_exists(path).await.unwrap_or(true) {
        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "directory still exists".to_string());
        return Err(AifixError::WorkspaceCleanup(format!(
            "{}: {reason}",
            path.display()
        )));
    }
    Ok(())
}

#[async_trait]
impl VersionControl for GitCli {
    async fn clone_repo(&self, url: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.workspace_dir).await?;
        let workspace = tokio::fs::canonicalize(&self.workspace_dir).await?;
        let target = workspace.join(repo_dir_name(url));

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            tracing::info!(path = %target.display(), "removing previous checkout");
            remove_checkout(&target).await?;
        }

        let target_str = target.to_string_lossy().to_string();
        self.git(None, &["clone", "--", url, &target_str])
            .await
            .map_err(AifixError::CloneFailed)?;
        tracing::info!(url = %url, path = %target.display(), "repository cloned");
        Ok(target)
    }

    async fn create_branch(&self, repo: &Path, team: &str, leader: &str) -> Result<String> {
        let name = format_branch_name(team, leader);

        if self.current_branch(repo).await.as_deref() == Some(name.as_str()) {
            tracing::info!(branch = %name, "reusing checked-out branch");
            return Ok(name);
        }
        if self.git(Some(repo), &["checkout", "-b", &name]).await.is_ok() {
            tracing::info!(branch = %name, "created branch");
            return Ok(name);
        }
        if self.git(Some(repo), &["checkout", &name]).await.is_ok() {
            tracing::info!(branch = %name, "checked out existing branch");
            return Ok(name);
        }

        let unique = format!("{name}_{}", chrono::Utc::now().timestamp());
        self.git(Some(repo), &["checkout", "-b", &unique])
            .await
            .map_err(AifixError::BranchFailed)?;
        tracing::info!(branch = %unique, "created disambiguated branch");
        Ok(unique)
    }

    async fn commit_fix(&self, repo: &Path, record: &FailureRecord) -> Result<String> {
        let message = commit_message_for(record);
        self.git(Some(repo), &["add", "--", &record.file])
            .await
            .map_err(AifixError::CommitFailed)?;

        let name = format!("user.name={}", self.author_name);
        let email = format!("user.email={}", self.author_email);
        self.git(
            Some(repo),
            &["-c", &name, "-c", &email, "commit", "-m", &message],
        )
        .await
        .map_err(AifixError::CommitFailed)?;

        Ok(message)
    }

    async fn push_branch(&self, repo: &Path, branch: &str) -> bool {
        let refspec = format!("{branch}:{branch}");
        match self.git(Some(repo), &["push", "origin", &refspec]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(branch = %branch, error = %e, "push failed");
                false
            }
        }
    }

    async fn is_dirty(&self, repo: &Path) -> bool {
        self.git(Some(repo), &["status", "--porcelain"])
            .await
            .map(|out| !out.is_empty())
            .unwrap_or(false)
    }

    async fn discard_changes(&self, repo: &Path, file: &str) -> Result<()> {
        // Unstage first; a failed commit may have left the file in the index.
        if let Err(e) = self.git(Some(repo), &["reset", "-q", "--", file]).await {
            tracing::debug!(file = %file, error = %e, "reset before discard failed");
        }
        self.git(Some(repo), &["checkout", "--", file])
            .await
            .map_err(AifixError::GitError)?;
        Ok(())
    }
}
