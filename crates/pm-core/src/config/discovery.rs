//! Configuration discovery and resolution

use super::types::MonitorConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Environment variable overriding the Passenger temp directory.
pub const TEMP_DIR_ENV: &str = "PASSENGER_MONITOR_TEMP_DIR";

/// Environment variable enabling verbose diagnostics (`1`, `true`, `yes`).
pub const VERBOSE_ENV: &str = "PASSENGER_MONITOR_VERBOSE";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading a config file
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Explicitly requested config file does not exist
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// A value is present but unusable
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Path to config file override
    pub config_path: Option<PathBuf>,
    /// Override the Passenger temp directory
    pub temp_dir: Option<PathBuf>,
    /// Force verbose diagnostics on
    pub verbose: bool,
    /// Override the socket timeout (seconds)
    pub timeout_secs: Option<u64>,
    /// Override the collection interval (seconds)
    pub interval_secs: Option<u64>,
    /// Override the reported host name
    pub hostname: Option<String>,
}

/// On-disk layout of the config file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    monitor: toml::Table,
}

/// Resolve configuration from all sources
///
/// An explicit `config_path` must exist and parse. The global config file is
/// optional; a broken global file is reported and skipped.
pub fn resolve_config(
    overrides: &ConfigOverrides,
    home_dir: &Path,
) -> Result<MonitorConfig, ConfigError> {
    let mut config = MonitorConfig::default();

    match overrides.config_path {
        Some(ref path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound { path: path.clone() });
            }
            let table = load_config_file(path)?;
            config.merge_toml(&table)?;
        }
        None => {
            let global_path = crate::home::global_config_path(home_dir);
            if global_path.exists() {
                match load_config_file(&global_path) {
                    Ok(table) => config.merge_toml(&table)?,
                    Err(e) => warn!("Failed to parse global config at {global_path:?}: {e}"),
                }
            }
        }
    }

    apply_env_overrides(&mut config);
    apply_cli_overrides(&mut config, overrides);

    config.validate()?;
    Ok(config)
}

/// Load the `[monitor]` table from a TOML file
pub fn load_config_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ConfigFile = toml::from_str(&contents)?;
    Ok(file.monitor)
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut MonitorConfig) {
    if let Ok(dir) = std::env::var(TEMP_DIR_ENV)
        && !dir.trim().is_empty()
    {
        config.temp_dir = PathBuf::from(dir.trim());
    }

    if let Ok(value) = std::env::var(VERBOSE_ENV) {
        config.verbose = matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        );
    }
}

/// Apply command-line overrides
fn apply_cli_overrides(config: &mut MonitorConfig, overrides: &ConfigOverrides) {
    if let Some(ref dir) = overrides.temp_dir {
        config.temp_dir = dir.clone();
    }

    if overrides.verbose {
        config.verbose = true;
    }

    if let Some(secs) = overrides.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }

    if let Some(secs) = overrides.interval_secs {
        config.interval = Duration::from_secs(secs);
    }

    if let Some(ref name) = overrides.hostname {
        config.hostname = Some(name.clone());
    }
}
