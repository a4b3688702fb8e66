//! Agent configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{AifixError, Result};
use crate::executor::TEST_TIMEOUT;
use crate::heartbeat::HEARTBEAT_INTERVAL;

pub const ENV_WORKSPACE_DIR: &str = "AIFIX_WORKSPACE_DIR";
pub const ENV_RESULTS_FILE: &str = "AIFIX_RESULTS_FILE";
pub const ENV_MAX_RETRIES: &str = "AIFIX_MAX_RETRIES";
pub const ENV_SANDBOX_URL: &str = "SANDBOX_URL";
pub const ENV_SANDBOX_TOKEN: &str = "SANDBOX_TOKEN";
pub const ENV_GIT_NAME: &str = "AIFIX_GIT_NAME";
pub const ENV_GIT_EMAIL: &str = "AIFIX_GIT_EMAIL";

pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Process-wide agent settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    /// Directory holding disposable checkouts.
    pub workspace_dir: PathBuf,
    /// Where the run report is persisted.
    pub results_file: PathBuf,
    /// Iteration budget.
    pub max_retries: u32,
    /// Remote sandbox base URL; remote execution is used when set.
    pub sandbox_url: Option<String>,
    /// Shared secret sent as `X-Sandbox-Token`.
    #[serde(skip_serializing)]
    pub sandbox_token: Option<String>,
    /// Commit author name.
    pub git_name: String,
    /// Commit author email.
    pub git_email: String,
    pub test_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("workspace"),
            results_file: PathBuf::from("results.json"),
            max_retries: DEFAULT_MAX_RETRIES,
            sandbox_url: None,
            sandbox_token: None,
            git_name: "AI Agent".to_string(),
            git_email: "ai-agent@localhost".to_string(),
            test_timeout: TEST_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }
}

impl AgentConfig {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(ENV_WORKSPACE_DIR) {
            config.workspace_dir = PathBuf::from(dir);
        }
        if let Some(file) = get(ENV_RESULTS_FILE) {
            config.results_file = PathBuf::from(file);
        }
        if let Some(raw) = get(ENV_MAX_RETRIES) {
            config.max_retries = raw.trim().parse().map_err(|_| {
                AifixError::InvalidConfig(format!("{ENV_MAX_RETRIES} must be an integer, got {raw:?}"))
            })?;
        }
        config.sandbox_url = get(ENV_SANDBOX_URL).map(|u| u.trim_end_matches('/').to_string());
        config.sandbox_token = get(ENV_SANDBOX_TOKEN);
        if let Some(name) = get(ENV_GIT_NAME) {
            config.git_name = name;
        }
        if let Some(email) = get(ENV_GIT_EMAIL) {
            config.git_email = email;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_sandbox(mut self, url: &str, token: Option<&str>) -> Self {
        self.sandbox_url = Some(url.trim_end_matches('/').to_string());
        self.sandbox_token = token.map(str::to_string);
        self
    }

    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }

    pub fn with_results_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.results_file = file.into();
        self
    }

    /// Whether tests execute in the remote sandbox.
    pub fn is_remote(&self) -> bool {
        self.sandbox_url.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(AifixError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.test_timeout.is_zero() {
            return Err(AifixError::InvalidConfig(
                "test_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
