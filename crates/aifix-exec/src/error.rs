//! Error types for aifix-exec

use std::time::Duration;

use thiserror::Error;

/// Errors raised while running commands or talking to the sandbox.
///
/// Executors never surface these to the repair loop; they are folded into
/// an `ExecutionOutput` and logged.
#[derive(Error, Debug)]
pub enum ExecError {
    /// Command template had no program
    #[error("empty command")]
    EmptyCommand,

    /// Program could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Command exceeded its wall-clock ceiling and was killed
    #[error("command timed out after {0:?}")]
    TimedOut(Duration),

    /// No sandbox URL configured
    #[error("sandbox is not configured")]
    NotConfigured,

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Sandbox answered with a non-success status
    #[error("sandbox returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ExecError {
    fn from(err: reqwest::Error) -> Self {
        ExecError::Http(err.to_string())
    }
}

/// Result type for aifix-exec operations.
pub type Result<T> = std::result::Result<T, ExecError>;
