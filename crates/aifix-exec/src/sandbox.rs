//! Remote sandbox client
//!
//! The sandbox clones the pushed fix branch into a throwaway workspace,
//! installs dependencies and runs the suite, returning the captured streams.
//! Paths in that output point into the sandbox's workspace and are rewritten
//! to the local checkout so the classifier can resolve them.

use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use aifix_core::{
    AgentConfig, ExecutionMode, ExecutionOutput, ProjectKind, RuntimeEnv, TestExecutor,
    TestRunRequest,
};

use crate::error::{ExecError, Result};

/// Shared-secret header.
pub const TOKEN_HEADER: &str = "X-Sandbox-Token";

/// Added to the test timeout to bound the whole HTTP exchange.
pub const HTTP_GRACE: Duration = Duration::from_secs(30);

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of `POST /run-tests`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunTestsRequest {
    pub repo_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub timeout_sec: u64,
}

/// Reply of `POST /run-tests`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunTestsResponse {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub returncode: Option<i32>,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub project_type: Option<String>,
    /// Checkout root inside the sandbox, when the server reports it.
    #[serde(default)]
    pub workdir: Option<String>,
}

impl RunTestsResponse {
    pub fn merged(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Reply of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// HTTP client for the sandbox service.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl SandboxClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("aifix/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
            http,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let url = config.sandbox_url.as_deref().ok_or(ExecError::NotConfigured)?;
        Self::new(url, config.sandbox_token.as_deref())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ExecError::Status {
            status: status.as_u16(),
            body,
        })
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .authorized(self.http.get(&url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Run the suite remotely; `timeout` bounds the whole exchange.
    pub async fn run_tests(
        &self,
        request: &RunTestsRequest,
        timeout: Duration,
    ) -> Result<RunTestsResponse> {
        let url = format!("{}/run-tests", self.base_url);
        debug!(url = %url, branch = ?request.branch, "requesting sandbox test run");
        let response = self
            .authorized(self.http.post(&url))
            .json(request)
            .timeout(timeout)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

/// Rewrite sandbox checkout paths in `output` to `local_root`.
///
/// Uses `workdir` when the server reported it, otherwise recognizes the
/// `…/agent-workspace-*/repo/` layout.
pub fn rewrite_sandbox_paths(output: &str, workdir: Option<&str>, local_root: &Path) -> String {
    let root = format!("{}/", local_root.display().to_string().trim_end_matches('/'));

    if let Some(workdir) = workdir.map(str::trim).filter(|w| !w.is_empty()) {
        let prefix = format!("{}/", workdir.trim_end_matches('/'));
        return output.replace(&prefix, &root);
    }

    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?:/[^/\s"':]+)*/agent-workspace-[^/\s"']+/repo/"#).expect("valid regex")
    });
    re.replace_all(output, NoExpand(&root)).into_owned()
}

/// Executor backed by the remote sandbox.
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    client: SandboxClient,
    grace: Duration,
}

impl SandboxExecutor {
    pub fn new(client: SandboxClient) -> Self {
        Self {
            client,
            grace: HTTP_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn client(&self) -> &SandboxClient {
        &self.client
    }
}

#[async_trait]
impl TestExecutor for SandboxExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Remote
    }

    async fn prepare(&self, _repo: &Path, kind: ProjectKind) -> RuntimeEnv {
        debug!(kind = %kind, "sandbox installs dependencies itself");
        RuntimeEnv::ambient()
    }

    async fn run_tests(&self, request: &TestRunRequest) -> ExecutionOutput {
        let started = Instant::now();
        let body = RunTestsRequest {
            repo_url: request.repo_url.clone(),
            branch: Some(request.branch.clone()).filter(|b| !b.is_empty()),
            timeout_sec: request.timeout.as_secs().max(1),
        };

        match self.client.run_tests(&body, request.timeout + self.grace).await {
            Ok(reply) if reply.timed_out => {
                warn!(stderr = %reply.stderr.trim(), "sandbox tests timed out");
                ExecutionOutput::timed_out(started.elapsed())
            }
            Ok(reply) => {
                debug!(
                    returncode = ?reply.returncode,
                    project_type = ?reply.project_type,
                    "sandbox run finished"
                );
                let output =
                    rewrite_sandbox_paths(&reply.merged(), reply.workdir.as_deref(), &request.repo_path);
                ExecutionOutput::completed(output, reply.returncode, started.elapsed())
            }
            Err(e) => {
                warn!(error = %e, base_url = %self.client.base_url(), "sandbox test execution failed");
                ExecutionOutput::unavailable(started.elapsed())
            }
        }
    }
}
