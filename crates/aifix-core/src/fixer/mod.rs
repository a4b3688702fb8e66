//! Rule-based fix dispatcher.
//!
//! Maps a [`FailureRecord`] to at most one deterministic, line-local text
//! transformation. Every rule declines (returns `None`) unless it finds the
//! exact shape it knows how to fix; nothing is guessed and the file is only
//! written when a rule produced an edit.

mod import;
mod indentation;
mod linting;
mod logic;
pub mod source;
mod syntax;
mod type_error;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{FailureKind, FailureRecord};
use source::{is_python_path, SourceFile};

/// Edit produced by a rule against an in-memory buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Edit {
    /// Rule identifier, for logs.
    pub rule: &'static str,
    /// Line the edit is anchored at (inserted/removed line for structural edits).
    pub line: u32,
    /// Net change in line count.
    pub delta: i32,
}

impl Edit {
    pub(crate) fn in_place(rule: &'static str, line: u32) -> Self {
        Self { rule, line, delta: 0 }
    }

    pub(crate) fn inserted(rule: &'static str, line: u32) -> Self {
        Self { rule, line, delta: 1 }
    }

    pub(crate) fn removed(rule: &'static str, line: u32) -> Self {
        Self {
            rule,
            line,
            delta: -1,
        }
    }
}

/// A transformation that was applied and written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedFix {
    pub file: String,
    pub rule: String,
    /// Anchor line of the edit, in the file's coordinates before this edit.
    pub line: u32,
    /// `+1` for an inserted line, `-1` for a deleted one, `0` for in-place.
    pub delta: i32,
}

impl AppliedFix {
    /// Move `line` (a position recorded before this fix) into the file's
    /// coordinates after this fix.
    pub fn shift(&self, line: u32) -> u32 {
        match self.delta.cmp(&0) {
            std::cmp::Ordering::Greater if line >= self.line => {
                line.saturating_add(self.delta as u32)
            }
            std::cmp::Ordering::Less if line > self.line => {
                line.saturating_sub(self.delta.unsigned_abs())
            }
            _ => line,
        }
    }
}

/// Stateless fix engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixEngine;

impl FixEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply the first matching rule for `record` and write the file.
    ///
    /// Returns `None` when no rule matched, the file is not eligible, or the
    /// write failed; the file is untouched in every `None` case.
    pub fn apply(&self, record: &FailureRecord, repo_root: &Path) -> Option<AppliedFix> {
        if record.kind != FailureKind::Linting && !is_python_path(&record.file) {
            tracing::debug!(file = %record.file, kind = %record.kind, "not a python source, declining");
            return None;
        }

        let mut src = SourceFile::load(repo_root, &record.file)?;
        let edit = match record.kind {
            FailureKind::Syntax => syntax::apply(record, &mut src),
            FailureKind::Indentation => indentation::apply(record, &mut src),
            FailureKind::TypeError => type_error::apply(record, &mut src),
            FailureKind::Import => import::apply(record, &mut src),
            FailureKind::Logic => logic::apply(record, &mut src),
            FailureKind::Linting => linting::apply(record, &mut src),
        }?;

        if let Err(e) = src.save() {
            tracing::warn!(file = %record.file, error = %e, "failed to write fix");
            return None;
        }

        tracing::debug!(
            file = %record.file,
            line = edit.line,
            rule = edit.rule,
            delta = edit.delta,
            "fix applied"
        );
        Some(AppliedFix {
            file: record.file.clone(),
            rule: edit.rule.to_string(),
            line: edit.line,
            delta: edit.delta,
        })
    }
}

/// Boolean view of [`FixEngine::apply`].
pub fn dispatch(record: &FailureRecord, repo_root: &Path) -> bool {
    FixEngine.apply(record, repo_root).is_some()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;

    use super::source::SourceFile;
    use super::Edit;
    use crate::domain::{FailureKind, FailureRecord};

    /// Run a rule against in-memory text; returns the edit and the new text.
    pub fn run(
        rule: fn(&FailureRecord, &mut SourceFile) -> Option<Edit>,
        kind: FailureKind,
        text: &str,
        line: u32,
        message: &str,
    ) -> (Option<Edit>, String) {
        let mut src = SourceFile::from_text(PathBuf::from("mem.py"), text);
        let record = FailureRecord::new(kind, "mem.py", line, message);
        let edit = rule(&record, &mut src);
        (edit, src.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, text: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_dispatch_fixes_assignment_in_condition() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app/calc.py", "x = 5\nif x = 5:\n    print(x)\n");
        let record = FailureRecord::new(FailureKind::Syntax, "app/calc.py", 2, "invalid syntax");

        assert!(dispatch(&record, dir.path()));
        let text = std::fs::read_to_string(dir.path().join("app/calc.py")).unwrap();
        assert_eq!(text, "x = 5\nif x == 5:\n    print(x)\n");
    }

    #[test]
    fn test_dispatch_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.py", "import foo_sdk\nprint(1)\n");
        let record = FailureRecord::new(
            FailureKind::Import,
            "main.py",
            1,
            "ModuleNotFoundError: No module named 'foo_sdk'",
        );

        assert!(dispatch(&record, dir.path()));
        let first = std::fs::read_to_string(dir.path().join("main.py")).unwrap();
        assert_eq!(first, "# import foo_sdk\nprint(1)\n");

        assert!(!dispatch(&record, dir.path()));
        let second = std::fs::read_to_string(dir.path().join("main.py")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_structural_rules_skip_non_python() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.js", "if (x = 5) {}\n");
        let record = FailureRecord::new(FailureKind::Syntax, "index.js", 1, "invalid syntax");
        assert!(!dispatch(&record, dir.path()));
    }

    #[test]
    fn test_linting_applies_to_any_text_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "notes.txt", "hello   \n");
        let record =
            FailureRecord::new(FailureKind::Linting, "notes.txt", 1, "W291 trailing whitespace");
        assert!(dispatch(&record, dir.path()));
        let text = std::fs::read_to_string(dir.path().join("notes.txt")).unwrap();
        assert_eq!(text, "hello\n");
    }

    #[test]
    fn test_missing_file_declines() {
        let dir = tempfile::tempdir().unwrap();
        let record = FailureRecord::new(FailureKind::Logic, "gone.py", 1, "name 'x' is not defined");
        assert!(!dispatch(&record, dir.path()));
    }

    #[test]
    fn test_apply_reports_line_delta() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "m.py", "def f():\n    return total\n");
        let record = FailureRecord::new(
            FailureKind::Logic,
            "m.py",
            2,
            "NameError: name 'total' is not defined",
        );
        let applied = FixEngine::new().apply(&record, dir.path()).unwrap();
        assert_eq!(applied.delta, 1);
        assert_eq!(applied.line, 2);
        assert_eq!(applied.shift(2), 3);
        assert_eq!(applied.shift(1), 1);
    }

    #[test]
    fn test_shift_after_deletion() {
        let applied = AppliedFix {
            file: "a.py".into(),
            rule: "unused_import".into(),
            line: 3,
            delta: -1,
        };
        assert_eq!(applied.shift(2), 2);
        assert_eq!(applied.shift(3), 3);
        assert_eq!(applied.shift(7), 6);
    }
}
