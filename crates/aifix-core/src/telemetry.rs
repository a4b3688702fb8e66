//! Log output for the `aifix` binary.
//!
//! Logs always go to stderr: `aifix run --progress` and `aifix classify`
//! print machine-readable data on stdout.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose debug output drowns the repair loop's own events.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Filter directives used when `RUST_LOG` is unset: `level` for aifix and
/// everything else, capped at `warn` for the HTTP stack.
pub fn default_directives(level: Level) -> String {
    let mut directives = vec![level.as_str().to_lowercase()];
    if level > Level::WARN {
        directives.extend(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")));
    }
    directives.join(",")
}

/// Install the global subscriber; a second call is a no-op.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
