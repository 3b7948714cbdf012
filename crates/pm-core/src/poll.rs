//! One collection cycle: locate, query, parse, normalize.
//!
//! Every failure is absorbed here. Callers only ever see a (possibly empty)
//! metrics map; the reason for an empty map is in the log.

use crate::client::StatusClient;
use crate::config::MonitorConfig;
use crate::locator::find_sockets;
use crate::metrics::{Metrics, normalize};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Pick the endpoint for this cycle: the first discovered socket.
///
/// Logs an error when there is none and a warning when the choice is ambiguous.
pub fn select_endpoint(sockets: &[PathBuf], root: &Path) -> Option<PathBuf> {
    match sockets {
        [] => {
            error!(
                "Unable to find running or accessible Passenger instances in '{}'",
                root.display()
            );
            None
        }
        [only] => Some(only.clone()),
        [first, ..] => {
            warn!(
                "More than one Passenger socket discovered in '{}', using the first found",
                root.display()
            );
            Some(first.clone())
        }
    }
}

/// Run one poll against the instance found under `config.temp_dir`.
pub fn collect_stats(config: &MonitorConfig) -> Metrics {
    let sockets = find_sockets(&config.temp_dir);
    let Some(endpoint) = select_endpoint(&sockets, &config.temp_dir) else {
        return Metrics::new();
    };

    debug!("Opening socket at '{}'", endpoint.display());
    let client = StatusClient::new(endpoint, config.timeout);

    let summary = match client.server_summary() {
        Ok(summary) => {
            debug!("Read from socket successfully");
            summary
        }
        Err(e) => {
            warn!(
                "Unable to connect to Passenger socket at '{}': {e}",
                client.endpoint().display()
            );
            return Metrics::new();
        }
    };

    if summary.is_empty() {
        return Metrics::new();
    }

    normalize(&summary, config.ignored_metrics.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_no_sockets_is_logged_error() {
        let temp = TempDir::new().unwrap();
        let config = MonitorConfig {
            temp_dir: temp.path().to_path_buf(),
            ..Default::default()
        };

        assert!(collect_stats(&config).is_empty());
        assert!(logs_contain("Unable to find running or accessible Passenger instances"));
    }

    #[test]
    #[traced_test]
    fn test_select_first_of_many_warns() {
        let sockets = vec![PathBuf::from("/tmp/a.socket"), PathBuf::from("/tmp/b.socket")];
        let chosen = select_endpoint(&sockets, Path::new("/tmp"));
        assert_eq!(chosen, Some(PathBuf::from("/tmp/a.socket")));
        assert!(logs_contain("More than one Passenger socket discovered in '/tmp'"));
    }

    #[test]
    #[traced_test]
    fn test_select_single_does_not_warn() {
        let sockets = vec![PathBuf::from("/tmp/a.socket")];
        assert_eq!(
            select_endpoint(&sockets, Path::new("/tmp")),
            Some(PathBuf::from("/tmp/a.socket"))
        );
        assert!(!logs_contain("More than one"));
    }

    #[cfg(unix)]
    #[test]
    #[traced_test]
    fn test_socket_file_without_listener_is_connection_warning() {
        let temp = TempDir::new().unwrap();
        let info = temp.path().join(format!("passenger.{}/info", std::process::id()));
        std::fs::create_dir_all(&info).unwrap();
        std::fs::write(info.join("status.socket"), "").unwrap();

        let config = MonitorConfig {
            temp_dir: temp.path().to_path_buf(),
            ..Default::default()
        };
        assert!(collect_stats(&config).is_empty());
        assert!(logs_contain("Unable to connect to Passenger socket at"));
    }
}
