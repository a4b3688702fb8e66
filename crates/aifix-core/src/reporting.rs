//! Run report persistence and rendering.
//!
//! Reports are written as pretty JSON with a sibling `<path>.digest` file
//! holding the SHA-256 of the JSON bytes; reads verify the digest.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::domain::{AifixError, FixStatus, Result, RunReport};

/// Sibling digest path for a report path.
pub fn digest_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(".digest");
    PathBuf::from(raw)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `report` to `path` plus its digest file. Parent directories are
/// created as needed.
pub fn write_run_report(report: &RunReport, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(report)?;
    let digest = sha256_hex(&json);

    std::fs::write(path, &json)?;
    std::fs::write(digest_path(path), digest.as_bytes())?;

    Ok(path.to_path_buf())
}

/// Read a report and verify it against its digest file.
pub fn read_run_report(path: &Path) -> Result<RunReport> {
    let json = std::fs::read(path)?;
    let expected = std::fs::read_to_string(digest_path(path))?;
    let actual = sha256_hex(&json);
    if expected.trim() != actual {
        return Err(AifixError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}

/// Markdown summary for PR comments and CI job output.
pub fn render_summary_md(report: &RunReport) -> String {
    let mut md = format!("# Repair Run: {}\n\n", report.status);
    md.push_str(&format!("- repository: `{}`\n", report.repo));
    md.push_str(&format!("- branch: `{}`\n", report.branch));
    md.push_str(&format!(
        "- project: {} ({:?} execution)\n",
        report.project_kind, report.mode
    ));
    md.push_str(&format!("- iterations: {}\n", report.iterations));
    md.push_str(&format!(
        "- failures (last classified iteration): {}\n",
        report.total_failures
    ));
    md.push_str(&format!(
        "- fixes: {} applied, {} failed\n",
        report.total_fixes,
        report.failed_fixes()
    ));
    md.push_str(&format!("- stop reason: {:?}\n", report.stop_reason));
    md.push_str(&format!(
        "- pushed: {}\n",
        if report.pushed { "yes" } else { "no" }
    ));
    let elapsed = report.finished_at - report.started_at;
    md.push_str(&format!("- duration: {}s\n", elapsed.num_seconds()));

    md.push_str("\n## Fixes\n\n");
    if report.fixes.is_empty() {
        md.push_str("none\n");
        return md;
    }
    md.push_str("| # | status | kind | file | line | commit |\n");
    md.push_str("|---|---|---|---|---|---|\n");
    for (i, fix) in report.fixes.iter().enumerate() {
        let status = match fix.status {
            FixStatus::Fixed => "fixed",
            FixStatus::Failed => "failed",
        };
        md.push_str(&format!(
            "| {} | {} | {} | `{}` | {} | {} |\n",
            i + 1,
            status,
            fix.kind,
            fix.file,
            fix.line,
            fix.commit_message
        ));
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ExecutionMode, FailureKind, FailureRecord, FixOutcome, ProjectKind, RunStatus, StopReason,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_report() -> RunReport {
        let a = FailureRecord::new(FailureKind::Syntax, "app/calc.py", 10, "invalid syntax");
        let b = FailureRecord::new(FailureKind::Logic, "app/calc.py", 20, "division by zero");
        let fixes = vec![
            FixOutcome::fixed(&a, crate::domain::commit_message_for(&a)),
            FixOutcome::failed(&b),
        ];
        let now = Utc::now();
        RunReport {
            run_id: Uuid::new_v4(),
            repo: "https://example.com/acme/calc.git".into(),
            branch: "CORE_ANA_AI_FIX".into(),
            project_kind: ProjectKind::Python,
            mode: ExecutionMode::Local,
            total_failures: 2,
            total_fixes: 1,
            iterations: 2,
            status: RunStatus::from_outcomes(&fixes),
            stop_reason: StopReason::NoFixesApplied,
            pushed: true,
            fixes,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_write_then_read_verifies_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/results.json");
        let report = sample_report();

        write_run_report(&report, &path).unwrap();
        assert!(digest_path(&path).exists());

        let loaded = read_run_report(&path).unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_tampered_report_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        write_run_report(&sample_report(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replace("PARTIAL", "PASSED")).unwrap();

        let err = read_run_report(&path).unwrap_err();
        assert!(matches!(err, AifixError::DigestMismatch { .. }));
    }

    #[test]
    fn test_persisted_status_is_uppercase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        write_run_report(&sample_report(), &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "PARTIAL");
        assert_eq!(value["fixes"][0]["kind"], "SYNTAX");
    }

    #[test]
    fn test_render_summary_lists_fixes() {
        let md = render_summary_md(&sample_report());
        assert!(md.starts_with("# Repair Run: PARTIAL"));
        assert!(md.contains("- fixes: 1 applied, 1 failed"));
        assert!(md.contains("[AI-AGENT] Fixed SYNTAX error in calc.py line 10"));
        assert!(md.contains("| 2 | failed | LOGIC | `app/calc.py` | 20 |  |"));
    }

    #[test]
    fn test_digest_path_appends_suffix() {
        assert_eq!(
            digest_path(Path::new("/tmp/results.json")),
            PathBuf::from("/tmp/results.json.digest")
        );
    }
}
