//! Shared logging initialization for passenger-monitor binaries.
//!
//! Diagnostics go to stderr; stdout is reserved for emitted samples.

use std::sync::OnceLock;

/// Environment variable selecting the log level explicitly.
pub const LOG_ENV: &str = "PASSENGER_MONITOR_LOG";

static INIT: OnceLock<()> = OnceLock::new();

/// Pick the level: `PASSENGER_MONITOR_LOG` wins, then the verbose flag.
pub fn parse_level(env_value: Option<&str>, verbose: bool) -> tracing::Level {
    let fallback = if verbose { "debug" } else { "info" };
    match env_value
        .unwrap_or(fallback)
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Initialize process-level tracing output.
///
/// Safe to call multiple times; only the first call installs the subscriber.
pub fn init(verbose: bool) {
    if INIT.get().is_some() {
        return;
    }
    let env_value = std::env::var(LOG_ENV).ok();
    let level = parse_level(env_value.as_deref(), verbose);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}
