//! Home directory resolution for passenger-monitor
//!
//! The global config file lives at `<home>/.config/passenger-monitor/config.toml`.
//! `PASSENGER_MONITOR_HOME` overrides the platform home so tests and custom
//! deployments can point the collector at an isolated directory.
//!
//! # Precedence
//!
//! 1. `PASSENGER_MONITOR_HOME` environment variable (if set and non-empty)
//! 2. `dirs::home_dir()` platform default

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable that overrides the home directory.
pub const HOME_ENV: &str = "PASSENGER_MONITOR_HOME";

/// Get the home directory used for config discovery.
///
/// # Errors
///
/// Returns an error if `PASSENGER_MONITOR_HOME` is unset (or blank) and the
/// platform home directory cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    dirs::home_dir().context("Could not determine home directory")
}

/// Path of the global config file under `home`.
pub fn global_config_path(home: &std::path::Path) -> PathBuf {
    home.join(".config/passenger-monitor/config.toml")
}
