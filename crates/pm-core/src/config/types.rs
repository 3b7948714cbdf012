//! Configuration types

use super::discovery::ConfigError;
use crate::metrics::DEFAULT_IGNORED_METRICS;
use std::path::PathBuf;
use std::time::Duration;

/// Root directory Passenger creates its instance directories under.
pub const DEFAULT_TEMP_DIR: &str = "/tmp";

/// Deadline for one connect plus request/response exchange.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Collection interval of the collector loop.
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Resolved collector configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Directory holding `passenger.<pid>` instance directories
    pub temp_dir: PathBuf,
    /// Emit verbose (debug-level) diagnostics
    pub verbose: bool,
    /// Deadline covering the connect and the whole exchange of one call
    pub timeout: Duration,
    /// Interval between polls
    pub interval: Duration,
    /// Status fields never reported as metrics
    pub ignored_metrics: Vec<String>,
    /// Host name used in emitted sample identifiers (None = system hostname)
    pub hostname: Option<String>,
    /// Config file keys that were not recognized
    pub unknown_keys: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            verbose: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            ignored_metrics: DEFAULT_IGNORED_METRICS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            hostname: None,
            unknown_keys: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Apply the `[monitor]` table of a config file on top of `self`.
    ///
    /// Keys use snake_case; the collectd-style names `PassengerTempDir` and
    /// `Verbose` are accepted as aliases. Unknown keys are recorded in
    /// `unknown_keys` for the caller to report.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a known key has the wrong type or
    /// a duration is below one second.
    pub fn merge_toml(&mut self, table: &toml::Table) -> Result<(), ConfigError> {
        for (key, value) in table {
            match key.as_str() {
                "temp_dir" | "PassengerTempDir" => {
                    let dir = value.as_str().ok_or_else(|| invalid(key, "a string"))?;
                    self.temp_dir = PathBuf::from(dir);
                }
                "verbose" | "Verbose" => {
                    self.verbose = value.as_bool().ok_or_else(|| invalid(key, "a boolean"))?;
                }
                "timeout_secs" => {
                    self.timeout = Duration::from_secs(positive_secs(key, value)?);
                }
                "interval_secs" => {
                    self.interval = Duration::from_secs(positive_secs(key, value)?);
                }
                "ignored_metrics" => {
                    let arr = value
                        .as_array()
                        .ok_or_else(|| invalid(key, "an array of strings"))?;
                    self.ignored_metrics = arr
                        .iter()
                        .map(|v| v.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| invalid(key, "an array of strings"))?;
                }
                "hostname" => {
                    let name = value.as_str().ok_or_else(|| invalid(key, "a string"))?;
                    self.hostname = Some(name.to_string());
                }
                other => {
                    self.unknown_keys.push(other.to_string());
                }
            }
        }
        Ok(())
    }

    /// Reject durations the socket layer cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                message: "timeout must be at least 1 second".to_string(),
            });
        }
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid {
                message: "interval must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }
}

fn invalid(key: &str, expected: &str) -> ConfigError {
    ConfigError::Invalid {
        message: format!("{key} must be {expected}"),
    }
}

fn positive_secs(key: &str, value: &toml::Value) -> Result<u64, ConfigError> {
    match value.as_integer() {
        Some(n) if n >= 1 => Ok(n as u64),
        _ => Err(invalid(key, "an integer of at least 1")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> toml::Table {
        src.parse::<toml::Table>().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.temp_dir, PathBuf::from("/tmp"));
        assert!(!config.verbose);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.ignored_metrics, vec!["max".to_string()]);
        assert!(config.hostname.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_all_keys() {
        let mut config = MonitorConfig::default();
        config
            .merge_toml(&table(
                r#"
temp_dir = "/var/run/passenger"
verbose = true
timeout_secs = 2
interval_secs = 30
ignored_metrics = ["max", "inactive"]
hostname = "web-1"
"#,
            ))
            .unwrap();

        assert_eq!(config.temp_dir, PathBuf::from("/var/run/passenger"));
        assert!(config.verbose);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.ignored_metrics, vec!["max", "inactive"]);
        assert_eq!(config.hostname.as_deref(), Some("web-1"));
    }

    #[test]
    fn test_collectd_style_aliases() {
        let mut config = MonitorConfig::default();
        config
            .merge_toml(&table("PassengerTempDir = \"/opt/tmp\"\nVerbose = true\n"))
            .unwrap();
        assert_eq!(config.temp_dir, PathBuf::from("/opt/tmp"));
        assert!(config.verbose);
    }

    #[test]
    fn test_unknown_key_is_skipped() {
        let mut config = MonitorConfig::default();
        config.merge_toml(&table("colour = \"blue\"\n")).unwrap();
        assert_eq!(config.unknown_keys, vec!["colour".to_string()]);
        assert_eq!(
            MonitorConfig {
                unknown_keys: Vec::new(),
                ..config
            },
            MonitorConfig::default()
        );
    }

    #[test]
    fn test_wrong_type_is_invalid() {
        let mut config = MonitorConfig::default();
        let err = config.merge_toml(&table("verbose = \"yes\"\n")).unwrap_err();
        assert!(err.to_string().contains("verbose must be a boolean"));
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let mut config = MonitorConfig::default();
        assert!(config.merge_toml(&table("timeout_secs = 0\n")).is_err());

        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_string_ignored_metric_is_invalid() {
        let mut config = MonitorConfig::default();
        assert!(config.merge_toml(&table("ignored_metrics = [1]\n")).is_err());
    }
}
