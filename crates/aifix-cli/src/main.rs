//! aifix - automated test-suite repair
//!
//! The `aifix` command clones a repository, runs its tests, patches the
//! failures it recognizes and commits every fix on a dedicated branch.
//!
//! ## Commands
//!
//! - `run`: Full repair run against a repository URL
//! - `classify`: Classify a saved test log into failure records
//! - `sandbox-health`: Probe the remote sandbox
//! - `report`: Verify and render a persisted run report

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use aifix_core::config::ENV_SANDBOX_TOKEN;
use aifix_core::{
    classify, read_run_report, render_summary_md, AgentConfig, ChannelSink, GitCli,
    ProgressSink, RepairConfig, RepairOrchestrator, RunReport, TracingSink,
};
use aifix_exec::{executor_for, SandboxClient};

#[derive(Parser)]
#[command(name = "aifix")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated test-suite repair loop", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone a repository, repair its failing tests and push a fix branch
    Run {
        /// Repository clone URL
        repo_url: String,

        /// Team name (first part of the branch name)
        #[arg(long, env = "AIFIX_TEAM")]
        team: String,

        /// Team leader name (second part of the branch name)
        #[arg(long, env = "AIFIX_LEADER")]
        leader: String,

        /// Maximum test/fix iterations (overrides AIFIX_MAX_RETRIES)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Directory for disposable checkouts (overrides AIFIX_WORKSPACE_DIR)
        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Report output path (overrides AIFIX_RESULTS_FILE)
        #[arg(long)]
        results: Option<PathBuf>,

        /// Remote sandbox base URL (overrides SANDBOX_URL)
        #[arg(long)]
        sandbox_url: Option<String>,

        /// Also write a Markdown summary here
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Print progress events as JSON lines on stdout
        #[arg(long)]
        progress: bool,
    },

    /// Classify a saved test log and print the failure records as JSON
    Classify {
        /// Log file produced by the test runner
        log: PathBuf,

        /// Repository root the log's paths refer to
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,
    },

    /// Check that the remote sandbox is reachable
    SandboxHealth {
        /// Sandbox base URL (defaults to SANDBOX_URL)
        #[arg(long)]
        url: Option<String>,
    },

    /// Verify a persisted run report and print it
    Report {
        /// Path to the report JSON
        path: PathBuf,

        /// Render as Markdown instead of JSON
        #[arg(long)]
        markdown: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    aifix_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            repo_url,
            team,
            leader,
            max_retries,
            workspace,
            results,
            sandbox_url,
            summary,
            progress,
        } => {
            let overrides = RunOverrides {
                max_retries,
                workspace,
                results,
                sandbox_url,
            };
            let env = AgentConfig::from_env().context("Invalid environment configuration")?;
            let config = overrides.apply(env)?;
            cmd_run(&config, &repo_url, &team, &leader, summary.as_deref(), progress).await
        }
        Commands::Classify { log, repo_root } => cmd_classify(&log, &repo_root),
        Commands::SandboxHealth { url } => cmd_sandbox_health(url.as_deref()).await,
        Commands::Report { path, markdown } => cmd_report(&path, markdown),
    }
}

/// Flag values that take precedence over the environment.
#[derive(Debug, Default)]
struct RunOverrides {
    max_retries: Option<u32>,
    workspace: Option<PathBuf>,
    results: Option<PathBuf>,
    sandbox_url: Option<String>,
}

impl RunOverrides {
    fn apply(self, mut config: AgentConfig) -> Result<AgentConfig> {
        if let Some(n) = self.max_retries {
            config = config.with_max_retries(n);
        }
        if let Some(dir) = self.workspace {
            config = config.with_workspace_dir(dir);
        }
        if let Some(path) = self.results {
            config = config.with_results_file(path);
        }
        if let Some(url) = self.sandbox_url {
            let token = config.sandbox_token.clone();
            config = config.with_sandbox(&url, token.as_deref());
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

async fn cmd_run(
    config: &AgentConfig,
    repo_url: &str,
    team: &str,
    leader: &str,
    summary: Option<&Path>,
    progress: bool,
) -> Result<()> {
    let vcs = Arc::new(GitCli::from_config(config));
    let executor = executor_for(config).context("Failed to set up test executor")?;
    let repair = RepairConfig::from_agent(config, repo_url, team, leader);

    let (sink, printer) = if progress {
        let (sink, mut rx) = ChannelSink::channel(256);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::debug!(error = %e, "unprintable progress event"),
                }
            }
        });
        let sink: Arc<dyn ProgressSink> = Arc::new(sink);
        (sink, Some(printer))
    } else {
        let sink: Arc<dyn ProgressSink> = Arc::new(TracingSink);
        (sink, None)
    };

    let orchestrator = RepairOrchestrator::new(repair, vcs, executor).with_sink(sink);
    let outcome = orchestrator.run().await;
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    let report = outcome.context("Repair run failed")?;

    if let Some(path) = summary {
        std::fs::write(path, render_summary_md(&report))
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    }
    if !progress {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Run ID: {}", report.run_id);
    println!("Branch: {}", report.branch);
    println!("Status: {}", report.status);
    println!("Stop reason: {:?}", report.stop_reason);
    println!("Iterations: {}", report.iterations);
    println!(
        "Fixes: {} applied, {} failed (last iteration saw {} failure(s))",
        report.total_fixes,
        report.failed_fixes(),
        report.total_failures
    );
    println!("Pushed: {}", if report.pushed { "yes" } else { "no" });
    for fix in &report.fixes {
        let mark = if fix.is_fixed() { "✓" } else { "✗" };
        println!("  {} {} {}:{}", mark, fix.kind, fix.file, fix.line);
    }
}

fn cmd_classify(log: &Path, repo_root: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(log)
        .with_context(|| format!("Failed to read log {}", log.display()))?;
    let records = classify(&raw, repo_root);
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

async fn cmd_sandbox_health(url: Option<&str>) -> Result<()> {
    let client = match url {
        Some(url) => {
            let token = std::env::var(ENV_SANDBOX_TOKEN).ok();
            SandboxClient::new(url, token.as_deref())
        }
        None => SandboxClient::from_config(&AgentConfig::from_env()?),
    }
    .context("Failed to create sandbox client")?;

    let health = client
        .health()
        .await
        .with_context(|| format!("Sandbox at {} is unreachable", client.base_url()))?;

    println!("Sandbox: {}", client.base_url());
    println!("Status: {}", health.status);
    if !health.is_ok() {
        anyhow::bail!("Sandbox reported status {:?}", health.status);
    }
    Ok(())
}

fn cmd_report(path: &Path, markdown: bool) -> Result<()> {
    let report = read_run_report(path)
        .with_context(|| format!("Failed to load report {}", path.display()))?;
    if markdown {
        print!("{}", render_summary_md(&report));
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
