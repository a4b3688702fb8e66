//! Classified test failure types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of failure kinds the classifier can emit.
///
/// Declaration order is the classification priority order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Syntax,
    Indentation,
    TypeError,
    Import,
    Logic,
    Linting,
}

impl FailureKind {
    /// All kinds, in priority order.
    pub const ALL: [FailureKind; 6] = [
        FailureKind::Syntax,
        FailureKind::Indentation,
        FailureKind::TypeError,
        FailureKind::Import,
        FailureKind::Logic,
        FailureKind::Linting,
    ];

    /// Tag used in commit messages and reports (e.g. `TYPE_ERROR`).
    pub fn tag(&self) -> &'static str {
        match self {
            FailureKind::Syntax => "SYNTAX",
            FailureKind::Indentation => "INDENTATION",
            FailureKind::TypeError => "TYPE_ERROR",
            FailureKind::Import => "IMPORT",
            FailureKind::Logic => "LOGIC",
            FailureKind::Linting => "LINTING",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One classified test failure extracted from raw runner output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FailureRecord {
    /// Failure kind.
    pub kind: FailureKind,

    /// Source file path, relative to the repository root, `/`-separated.
    pub file: String,

    /// Line number (1-indexed, 0 when unknown).
    pub line: u32,

    /// Raw diagnostic text.
    pub message: String,
}

impl FailureRecord {
    /// Create a new record.
    pub fn new(
        kind: FailureKind,
        file: impl Into<String>,
        line: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Final path component of `file`.
    pub fn basename(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }

    /// Copy of this record pointing at a different line.
    pub fn at_line(&self, line: u32) -> Self {
        Self {
            line,
            ..self.clone()
        }
    }
}
