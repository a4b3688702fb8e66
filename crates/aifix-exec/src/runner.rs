//! Child process execution with a hard wall-clock ceiling.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::command::CommandSpec;
use crate::error::{ExecError, Result};

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl ProcessOutput {
    /// stdout followed by stderr.
    pub fn merged(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run `spec` in `cwd`, killing it once `timeout` elapses.
///
/// On timeout the child is killed, any partial output is discarded and
/// [`ExecError::TimedOut`] is returned.
pub async fn run_command(spec: &CommandSpec, cwd: &Path, timeout: Duration) -> Result<ProcessOutput> {
    if spec.program.is_empty() {
        return Err(ExecError::EmptyCommand);
    }
    let started = Instant::now();

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    let mut stdout = tokio::spawn(read_all(child.stdout.take()));
    let mut stderr = tokio::spawn(read_all(child.stderr.take()));

    // Descendants may hold the pipes open after the child exits; the drains
    // count against the same ceiling.
    let finished = tokio::time::timeout(timeout, async {
        let status = child.wait().await?;
        let out = (&mut stdout).await.unwrap_or_default();
        let err = (&mut stderr).await.unwrap_or_default();
        Ok::<_, std::io::Error>((status, out, err))
    })
    .await;

    match finished {
        Ok(result) => {
            let (status, stdout, stderr) = result?;
            Ok(ProcessOutput {
                stdout,
                stderr,
                exit_code: status.code(),
                duration: started.elapsed(),
            })
        }
        Err(_) => {
            if let Err(e) = child.kill().await {
                tracing::debug!(program = %spec.program, error = %e, "kill after timeout failed");
            }
            stdout.abort();
            stderr.abort();
            tracing::warn!(command = %spec, timeout_secs = timeout.as_secs(), "command timed out");
            Err(ExecError::TimedOut(timeout))
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buf).await {
            tracing::debug!(error = %e, "pipe read ended early");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", &["-c", script])
    }

    #[tokio::test]
    async fn test_merges_stdout_then_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_command(&sh("echo out; echo err >&2; exit 3"), dir.path(), Duration::from_secs(10))
            .await
            .expect("run");
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
        assert_eq!(out.merged(), "out\n\nerr\n");
    }

    #[tokio::test]
    async fn test_runs_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let out = run_command(&sh("cat marker.txt"), dir.path(), Duration::from_secs(10))
            .await
            .expect("run");
        assert!(out.success());
        assert_eq!(out.stdout, "here");
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let err = run_command(&sh("echo partial; sleep 30"), dir.path(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_timeout_covers_descendants_holding_pipes() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let err = run_command(&sh("sleep 8 & echo started"), dir.path(), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("/definitely/not/a/program", &[]);
        let err = run_command(&spec, dir.path(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_empty_program_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("", &[]);
        assert!(matches!(
            run_command(&spec, dir.path(), Duration::from_secs(1)).await,
            Err(ExecError::EmptyCommand)
        ));
    }
}
