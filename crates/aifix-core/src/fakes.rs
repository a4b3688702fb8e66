//! In-memory fakes for the collaborator traits (testing only).
//!
//! `ScriptedExecutor` replays canned test outputs, `MemoryVcs` tracks commits
//! and pushes against a prepared checkout directory, and `RecordingSink`
//! collects progress events.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    commit_message_for, AifixError, ExecutionMode, FailureRecord, ProjectKind, Result,
};
use crate::events::{ProgressEvent, ProgressSink, ProgressStatus};
use crate::executor::{ExecutionOutput, RuntimeEnv, TestExecutor, TestRunRequest};
use crate::vcs::{format_branch_name, VersionControl};

// ---------------------------------------------------------------------------
// ScriptedExecutor
// ---------------------------------------------------------------------------

/// Executor that returns queued outputs in order, then clean (empty, exit 0)
/// runs once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedExecutor {
    mode: ExecutionMode,
    outputs: Mutex<VecDeque<ExecutionOutput>>,
    requests: Mutex<Vec<TestRunRequest>>,
    prepared: Mutex<Vec<(PathBuf, ProjectKind)>>,
    delay: Duration,
}

impl ScriptedExecutor {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            outputs: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            prepared: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn local() -> Self {
        Self::new(ExecutionMode::Local)
    }

    pub fn remote() -> Self {
        Self::new(ExecutionMode::Remote)
    }

    /// Queue a completed run with `output` and exit code 1.
    pub fn then_output(self, output: &str) -> Self {
        self.push(ExecutionOutput::completed(
            output.to_string(),
            Some(1),
            Duration::ZERO,
        ))
    }

    /// Queue a passing run (exit 0, no diagnostics).
    pub fn then_pass(self) -> Self {
        self.push(ExecutionOutput::completed(
            "===== 3 passed in 0.01s =====\n".to_string(),
            Some(0),
            Duration::ZERO,
        ))
    }

    pub fn then_timeout(self) -> Self {
        self.push(ExecutionOutput::timed_out(Duration::from_secs(120)))
    }

    pub fn then_unavailable(self) -> Self {
        self.push(ExecutionOutput::unavailable(Duration::ZERO))
    }

    /// Simulated run duration (use with a paused tokio clock).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn push(self, output: ExecutionOutput) -> Self {
        self.outputs.lock().unwrap().push_back(output);
        self
    }

    pub fn requests(&self) -> Vec<TestRunRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn prepared(&self) -> Vec<(PathBuf, ProjectKind)> {
        self.prepared.lock().unwrap().clone()
    }
}

#[async_trait]
impl TestExecutor for ScriptedExecutor {
    fn mode(&self) -> ExecutionMode {
        self.mode
    }

    async fn prepare(&self, repo: &Path, kind: ProjectKind) -> RuntimeEnv {
        self.prepared
            .lock()
            .unwrap()
            .push((repo.to_path_buf(), kind));
        RuntimeEnv::ambient()
    }

    async fn run_tests(&self, request: &TestRunRequest) -> ExecutionOutput {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.outputs.lock().unwrap().pop_front();
        next.unwrap_or_else(|| ExecutionOutput::completed(String::new(), Some(0), Duration::ZERO))
    }
}

// ---------------------------------------------------------------------------
// MemoryVcs
// ---------------------------------------------------------------------------

/// Version control over a directory the test prepared in advance.
///
/// `clone_repo` snapshots every file under the checkout as the committed
/// baseline; commits update the baseline and `discard_changes` restores it.
#[derive(Debug)]
pub struct MemoryVcs {
    checkout: PathBuf,
    baseline: Mutex<HashMap<String, Vec<u8>>>,
    commits: Mutex<Vec<String>>,
    pushes: Mutex<Vec<String>>,
    push_results: Mutex<VecDeque<bool>>,
    discarded: Mutex<Vec<String>>,
    failing_commits: HashSet<String>,
    fail_clone: bool,
    fail_branch: bool,
}

impl MemoryVcs {
    pub fn new(checkout: impl Into<PathBuf>) -> Self {
        Self {
            checkout: checkout.into(),
            baseline: Mutex::new(HashMap::new()),
            commits: Mutex::new(Vec::new()),
            pushes: Mutex::new(Vec::new()),
            push_results: Mutex::new(VecDeque::new()),
            discarded: Mutex::new(Vec::new()),
            failing_commits: HashSet::new(),
            fail_clone: false,
            fail_branch: false,
        }
    }

    /// Commits touching `file` fail.
    pub fn fail_commits_for(mut self, file: &str) -> Self {
        self.failing_commits.insert(file.to_string());
        self
    }

    pub fn fail_clone(mut self) -> Self {
        self.fail_clone = true;
        self
    }

    pub fn fail_branch(mut self) -> Self {
        self.fail_branch = true;
        self
    }

    /// Results for successive pushes; pushes beyond the list succeed.
    pub fn with_push_results(self, results: &[bool]) -> Self {
        self.push_results
            .lock()
            .unwrap()
            .extend(results.iter().copied());
        self
    }

    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().unwrap().clone()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }

    fn snapshot(&self) -> std::io::Result<HashMap<String, Vec<u8>>> {
        let mut files = HashMap::new();
        collect_files(&self.checkout, &self.checkout, &mut files)?;
        Ok(files)
    }
}

fn collect_files(
    root: &Path,
    dir: &Path,
    out: &mut HashMap<String, Vec<u8>>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.insert(rel, std::fs::read(&path)?);
        }
    }
    Ok(())
}

#[async_trait]
impl VersionControl for MemoryVcs {
    async fn clone_repo(&self, url: &str) -> Result<PathBuf> {
        if self.fail_clone {
            return Err(AifixError::CloneFailed(format!("{url}: repository not found")));
        }
        let files = self.snapshot()?;
        *self.baseline.lock().unwrap() = files;
        Ok(self.checkout.clone())
    }

    async fn create_branch(&self, _repo: &Path, team: &str, leader: &str) -> Result<String> {
        if self.fail_branch {
            return Err(AifixError::BranchFailed("detached HEAD".to_string()));
        }
        Ok(format_branch_name(team, leader))
    }

    async fn commit_fix(&self, repo: &Path, record: &FailureRecord) -> Result<String> {
        if self.failing_commits.contains(&record.file) {
            return Err(AifixError::CommitFailed(format!(
                "pre-commit hook rejected {}",
                record.file
            )));
        }
        let content = std::fs::read(repo.join(&record.file))?;
        self.baseline
            .lock()
            .unwrap()
            .insert(record.file.clone(), content);
        let message = commit_message_for(record);
        self.commits.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn push_branch(&self, _repo: &Path, branch: &str) -> bool {
        self.pushes.lock().unwrap().push(branch.to_string());
        self.push_results.lock().unwrap().pop_front().unwrap_or(true)
    }

    async fn is_dirty(&self, _repo: &Path) -> bool {
        let baseline = self.baseline.lock().unwrap().clone();
        match self.snapshot() {
            Ok(current) => current != baseline,
            Err(_) => false,
        }
    }

    async fn discard_changes(&self, repo: &Path, file: &str) -> Result<()> {
        self.discarded.lock().unwrap().push(file.to_string());
        let original = self.baseline.lock().unwrap().get(file).cloned();
        match original {
            Some(bytes) => std::fs::write(repo.join(file), bytes)?,
            None => {
                let _ = std::fs::remove_file(repo.join(file));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<ProgressStatus> {
        self.events.lock().unwrap().iter().map(|e| e.status).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
