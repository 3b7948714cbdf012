//! Configuration resolution
//!
//! Resolves the collector configuration once at start-up, with priority:
//! 1. Command-line flags (passed as [`ConfigOverrides`])
//! 2. Environment variables (`PASSENGER_MONITOR_TEMP_DIR`, `PASSENGER_MONITOR_VERBOSE`)
//! 3. Config file (`--config` or `~/.config/passenger-monitor/config.toml`)
//! 4. Defaults
//!
//! The resolved [`MonitorConfig`] is read-only afterwards and is passed by
//! reference into every poll.

mod discovery;
mod types;

pub use discovery::{ConfigError, ConfigOverrides, load_config_file, resolve_config};
pub use types::{
    DEFAULT_INTERVAL_SECS, DEFAULT_TEMP_DIR, DEFAULT_TIMEOUT_SECS, MonitorConfig,
};
