//! Domain-level error taxonomy for aifix.

/// aifix domain errors.
///
/// Only the variants raised by clone and branch setup abort a run; everything
/// else is absorbed into outcome records by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum AifixError {
    #[error("clone failed: {0}")]
    CloneFailed(String),

    #[error("workspace cleanup failed: {0}")]
    WorkspaceCleanup(String),

    #[error("branch setup failed: {0}")]
    BranchFailed(String),

    #[error("push failed: {0}")]
    PushFailed(String),

    #[error("commit failed: {0}")]
    CommitFailed(String),

    #[error("git error: {0}")]
    GitError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for aifix domain operations.
pub type Result<T> = std::result::Result<T, AifixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aifix_error_display() {
        let err = AifixError::CloneFailed("repository not found".to_string());
        assert!(err.to_string().contains("clone failed"));

        let err = AifixError::BranchFailed("detached HEAD".to_string());
        assert!(err.to_string().contains("branch setup failed"));
        assert!(err.to_string().contains("detached HEAD"));
    }

    #[test]
    fn test_digest_mismatch_error() {
        let err = AifixError::DigestMismatch {
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AifixError = io.into();
        assert!(err.to_string().contains("io error"));
    }
}
