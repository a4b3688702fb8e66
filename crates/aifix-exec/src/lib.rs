//! aifix Exec - test execution backends
//!
//! Provides the two [`TestExecutor`] implementations used by the repair loop:
//! - [`LocalExecutor`]: virtualenv, dependency install and test suite as
//!   local child processes with hard timeouts
//! - [`SandboxExecutor`]: the same suite run by a remote sandbox over HTTP

pub mod command;
pub mod error;
pub mod local;
pub mod runner;
pub mod sandbox;

use std::sync::Arc;

use aifix_core::{AgentConfig, TestExecutor};

pub use command::{install_command, test_command, CommandSpec};
pub use error::{ExecError, Result};
pub use local::LocalExecutor;
pub use runner::{run_command, ProcessOutput};
pub use sandbox::{
    rewrite_sandbox_paths, HealthResponse, RunTestsRequest, RunTestsResponse, SandboxClient,
    SandboxExecutor,
};

/// Executor selected by configuration: remote when a sandbox URL is set.
pub fn executor_for(config: &AgentConfig) -> Result<Arc<dyn TestExecutor>> {
    if config.is_remote() {
        let client = SandboxClient::from_config(config)?;
        tracing::info!(base_url = %client.base_url(), "using remote sandbox executor");
        Ok(Arc::new(SandboxExecutor::new(client)))
    } else {
        Ok(Arc::new(LocalExecutor::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aifix_core::ExecutionMode;

    #[test]
    fn test_executor_selection() {
        let local = executor_for(&AgentConfig::default()).unwrap();
        assert_eq!(local.mode(), ExecutionMode::Local);

        let remote = executor_for(&AgentConfig::default().with_sandbox("http://s:1", None)).unwrap();
        assert_eq!(remote.mode(), ExecutionMode::Remote);
    }
}
