//! Project kind detection from marker manifests.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Kind of project under repair; selects the test command template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    /// `package.json` present: `npm test`.
    Node,
    /// `requirements.txt` present, or nothing recognizable: `pytest`.
    Python,
}

impl ProjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectKind::Node => "node",
            ProjectKind::Python => "python",
        }
    }

    /// Parse the loose labels used by the remote sandbox protocol.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "node" | "javascript" | "js" => Some(ProjectKind::Node),
            "python" | "py" => Some(ProjectKind::Python),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manifest file marking a Node project.
pub const NODE_MANIFEST: &str = "package.json";

/// Manifest file marking a Python project.
pub const PYTHON_MANIFEST: &str = "requirements.txt";

/// Result of project detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectDetection {
    pub kind: ProjectKind,
    /// True when no manifest matched and the Python default was applied.
    pub defaulted: bool,
}

/// Detect the project kind by marker manifest, in priority order.
pub fn detect_project_kind(repo_root: &Path) -> ProjectDetection {
    if repo_root.join(NODE_MANIFEST).is_file() {
        return ProjectDetection {
            kind: ProjectKind::Node,
            defaulted: false,
        };
    }
    if repo_root.join(PYTHON_MANIFEST).is_file() {
        return ProjectDetection {
            kind: ProjectKind::Python,
            defaulted: false,
        };
    }
    ProjectDetection {
        kind: ProjectKind::Python,
        defaulted: true,
    }
}
