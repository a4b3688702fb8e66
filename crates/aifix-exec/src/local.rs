//! Executor that runs installs and test suites as local child processes.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use aifix_core::executor::{INSTALL_TIMEOUT, TEST_TIMEOUT};
use aifix_core::{
    ExecutionMode, ExecutionOutput, ProjectKind, RuntimeEnv, TestExecutor, TestRunRequest,
};

use crate::command::{
    create_venv_command, install_command, test_command, venv_python, DEFAULT_PYTHON,
};
use crate::error::ExecError;
use crate::runner::run_command;

/// Local process executor.
///
/// `prepare` creates a `.venv` for Python projects (reused when present) and
/// installs dependencies; both steps are best-effort. `run_tests` never
/// fails: timeouts and spawn errors become empty outputs.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    base_python: String,
    create_venv: bool,
    install_timeout: Duration,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self {
            base_python: DEFAULT_PYTHON.to_string(),
            create_venv: true,
            install_timeout: INSTALL_TIMEOUT,
        }
    }
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpreter used to create the virtualenv, and to run everything when
    /// no virtualenv exists.
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.base_python = python.into();
        self
    }

    /// Use the base interpreter directly.
    pub fn without_venv(mut self) -> Self {
        self.create_venv = false;
        self
    }

    pub fn with_install_timeout(mut self, timeout: Duration) -> Self {
        self.install_timeout = timeout;
        self
    }

    fn python_for(&self, env: &RuntimeEnv) -> String {
        env.python
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.base_python.clone())
    }

    async fn ensure_venv(&self, repo: &Path) -> Option<PathBuf> {
        let python = venv_python(repo);
        if python.is_file() {
            debug!(path = %python.display(), "reusing existing virtualenv");
            return Some(python);
        }

        let cmd = create_venv_command(&self.base_python);
        match run_command(&cmd, repo, self.install_timeout).await {
            Ok(out) if out.success() && python.is_file() => {
                info!(path = %python.display(), "virtualenv created");
                Some(python)
            }
            Ok(out) => {
                warn!(
                    exit_code = ?out.exit_code,
                    stderr = %head(&out.stderr),
                    "virtualenv creation failed, using base interpreter"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "virtualenv creation failed, using base interpreter");
                None
            }
        }
    }
}

fn head(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl TestExecutor for LocalExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Local
    }

    async fn prepare(&self, repo: &Path, kind: ProjectKind) -> RuntimeEnv {
        let mut env = RuntimeEnv::ambient();
        if kind == ProjectKind::Python && self.create_venv {
            env.python = self.ensure_venv(repo).await;
        }

        let python = self.python_for(&env);
        let Some(cmd) = install_command(repo, kind, &python) else {
            debug!(kind = %kind, "no dependency manifest, skipping install");
            return env;
        };

        info!(command = %cmd, "installing dependencies");
        match run_command(&cmd, repo, self.install_timeout).await {
            Ok(out) if out.success() => info!(
                duration_ms = out.duration.as_millis() as u64,
                "dependencies installed"
            ),
            Ok(out) => warn!(
                exit_code = ?out.exit_code,
                stderr = %head(&out.stderr),
                "dependency install reported errors"
            ),
            Err(e) => warn!(error = %e, "dependency install failed"),
        }
        env
    }

    async fn run_tests(&self, request: &TestRunRequest) -> ExecutionOutput {
        let started = Instant::now();
        let python = self.python_for(&request.env);
        let cmd = test_command(request.project_kind, &python);
        let timeout = if request.timeout.is_zero() {
            TEST_TIMEOUT
        } else {
            request.timeout
        };

        debug!(command = %cmd, timeout_secs = timeout.as_secs(), "running tests");
        match run_command(&cmd, &request.repo_path, timeout).await {
            Ok(out) => {
                debug!(exit_code = ?out.exit_code, "tests finished");
                ExecutionOutput::completed(out.merged(), out.exit_code, out.duration)
            }
            Err(ExecError::TimedOut(_)) => ExecutionOutput::timed_out(started.elapsed()),
            Err(e) => {
                warn!(error = %e, command = %cmd, "test command could not run");
                ExecutionOutput::unavailable(started.elapsed())
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Write an executable stand-in for the interpreter.
    fn fake_python(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-python");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn request(repo: &Path, timeout: Duration) -> TestRunRequest {
        TestRunRequest {
            repo_path: repo.to_path_buf(),
            repo_url: "file:///unused".into(),
            branch: "B".into(),
            project_kind: ProjectKind::Python,
            env: RuntimeEnv::ambient(),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_run_tests_merges_output() {
        let tools = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let python = fake_python(tools.path(), "echo \"args: $*\"; echo boom >&2; exit 1");
        let exec = LocalExecutor::new().with_python(python).without_venv();

        let out = exec.run_tests(&request(repo.path(), Duration::from_secs(10))).await;
        assert!(!out.timed_out);
        assert_eq!(out.exit_code, Some(1));
        assert!(out.output.contains("args: -m pytest --maxfail=10 -v --tb=short"));
        assert!(out.output.contains("boom"));
    }

    #[tokio::test]
    async fn test_run_tests_timeout() {
        let tools = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let python = fake_python(tools.path(), "sleep 30");
        let exec = LocalExecutor::new().with_python(python).without_venv();

        let out = exec.run_tests(&request(repo.path(), Duration::from_millis(200))).await;
        assert!(out.timed_out);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_run_tests_missing_interpreter_is_unavailable() {
        let repo = tempfile::tempdir().unwrap();
        let exec = LocalExecutor::new()
            .with_python("/no/such/python")
            .without_venv();

        let out = exec.run_tests(&request(repo.path(), Duration::from_secs(1))).await;
        assert!(!out.timed_out);
        assert!(out.is_empty());
        assert_eq!(out.exit_code, None);
    }

    #[tokio::test]
    async fn test_prepare_installs_requirements() {
        let tools = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("requirements.txt"), "pytest\n").unwrap();
        let log = repo.path().join("calls.log");
        let python = fake_python(tools.path(), &format!("echo \"$*\" >> {}", log.display()));
        let exec = LocalExecutor::new().with_python(python).without_venv();

        let env = exec.prepare(repo.path(), ProjectKind::Python).await;
        assert!(!env.is_isolated());
        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls.trim(), "-m pip install -r requirements.txt");
    }

    #[tokio::test]
    async fn test_prepare_reuses_existing_venv() {
        let tools = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let bin = repo.path().join(".venv/bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("python"), "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(bin.join("python"), std::fs::Permissions::from_mode(0o755))
            .unwrap();
        let base = fake_python(tools.path(), "exit 1");
        let exec = LocalExecutor::new().with_python(base);

        let env = exec.prepare(repo.path(), ProjectKind::Python).await;
        assert_eq!(env.python, Some(bin.join("python")));
    }

    #[tokio::test]
    async fn test_prepare_falls_back_when_venv_fails() {
        let tools = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let base = fake_python(tools.path(), "exit 1");
        let exec = LocalExecutor::new().with_python(base);

        let env = exec.prepare(repo.path(), ProjectKind::Python).await;
        assert_eq!(env, RuntimeEnv::ambient());
    }

    #[test]
    fn test_head_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        assert_eq!(head(&long).chars().count(), 200);
        assert_eq!(head("short"), "short");
    }
}
