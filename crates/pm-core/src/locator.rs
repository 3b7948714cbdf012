//! Discovery of Passenger control sockets.
//!
//! Each running Passenger instance owns a directory directly under the temp
//! root, named after the watchdog pid:
//!
//! ```text
//! ${TEMP_DIR}/passenger.<pid>/info/status.socket
//! ```
//!
//! A directory only yields a candidate when its pid still exists and the
//! status socket file is present. Liveness is a point-in-time check; the
//! process can still exit before the socket is connected.
//!
//! # Platform Notes
//!
//! Pid probing uses `kill(pid, 0)`, so on non-Unix platforms discovery always
//! returns an empty list.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix of instance directory names (`passenger.<pid>`).
pub const SOCKET_DIR_PREFIX: &str = "passenger";

/// Status socket location relative to an instance directory.
pub const STATUS_SOCKET_RELATIVE: &str = "info/status.socket";

/// Result of a zero-signal liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidState {
    /// The process exists and we may signal it.
    Alive,
    /// The process exists but belongs to another user (`EPERM`).
    Inaccessible,
    /// No such process, or the probe failed for another reason.
    Gone,
}

impl PidState {
    /// Whether the owning instance should still be considered running.
    pub fn exists(self) -> bool {
        matches!(self, PidState::Alive | PidState::Inaccessible)
    }
}

/// A discovered, not-yet-selected control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketCandidate {
    /// Instance directory (`<root>/passenger.<pid>`).
    pub dir: PathBuf,
    /// Pid embedded in the directory name.
    pub pid: i32,
    /// Absolute path of the status socket.
    pub socket_path: PathBuf,
}

/// Return the usable status socket paths under `root`, in discovery order.
///
/// A missing or unreadable root yields an empty list.
pub fn find_sockets(root: &Path) -> Vec<PathBuf> {
    discover(root)
        .into_iter()
        .map(|candidate| candidate.socket_path)
        .collect()
}

/// Enumerate live candidates under `root`.
///
/// Matching directory names are sorted before probing so the order is stable.
pub fn discover(root: &Path) -> Vec<SocketCandidate> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read Passenger temp dir {}: {e}", root.display());
            return Vec::new();
        }
    };

    let mut instances: Vec<(String, i32)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let pid = parse_instance_pid(&name)?;
            Some((name, pid))
        })
        .collect();
    instances.sort();

    let mut candidates = Vec::new();
    for (name, pid) in instances {
        let state = probe_pid(pid);
        if !state.exists() {
            debug!("Skipping {name}: pid {pid} is not running");
            continue;
        }

        let dir = root.join(&name);
        let socket_path = dir.join(STATUS_SOCKET_RELATIVE);
        if !socket_path.exists() {
            debug!("Skipping {name}: no status socket at {}", socket_path.display());
            continue;
        }

        candidates.push(SocketCandidate {
            dir,
            pid,
            socket_path,
        });
    }

    candidates
}

/// Extract the pid from an instance directory name such as `passenger.1234`.
///
/// Returns `None` for names with a different prefix or a non-positive pid.
pub fn parse_instance_pid(name: &str) -> Option<i32> {
    let rest = name.strip_prefix(SOCKET_DIR_PREFIX)?.strip_prefix('.')?;
    match rest.parse::<i32>() {
        Ok(pid) if pid > 0 => Some(pid),
        _ => None,
    }
}

/// Probe whether `pid` exists using `kill(pid, 0)`.
#[cfg(unix)]
pub fn probe_pid(pid: i32) -> PidState {
    // SAFETY: signal 0 performs the existence and permission checks only; no
    // signal is delivered.
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if result == 0 {
        return PidState::Alive;
    }

    classify_probe_errno(std::io::Error::last_os_error().raw_os_error())
}

/// Map the errno of a failed `kill(pid, 0)` to a liveness state.
///
/// `EPERM` means the process exists under another user; anything else
/// (`ESRCH` included) means it is gone.
#[cfg(unix)]
pub fn classify_probe_errno(errno: Option<i32>) -> PidState {
    match errno {
        Some(libc::EPERM) => PidState::Inaccessible,
        _ => PidState::Gone,
    }
}

#[cfg(not(unix))]
pub fn probe_pid(pid: i32) -> PidState {
    let _ = pid;
    PidState::Gone
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_instance_pid() {
        assert_eq!(parse_instance_pid("passenger.1234"), Some(1234));
        assert_eq!(parse_instance_pid("passenger.abc"), None);
        assert_eq!(parse_instance_pid("passenger.0"), None);
        assert_eq!(parse_instance_pid("passenger.-5"), None);
        assert_eq!(parse_instance_pid("passenger1234"), None);
        assert_eq!(parse_instance_pid("nginx.1234"), None);
        assert_eq!(parse_instance_pid("passenger."), None);
    }

    #[test]
    fn test_missing_root_yields_empty() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("does-not-exist");
        assert!(find_sockets(&missing).is_empty());
    }

    #[test]
    fn test_root_without_instances_yields_empty() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("unrelated.dir")).unwrap();
        std::fs::write(temp.path().join("passenger.notes"), "x").unwrap();
        assert!(find_sockets(temp.path()).is_empty());
    }

    #[test]
    fn test_exists_covers_inaccessible() {
        assert!(PidState::Alive.exists());
        assert!(PidState::Inaccessible.exists());
        assert!(!PidState::Gone.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_current_process_is_alive() {
        let pid = std::process::id() as i32;
        assert_eq!(probe_pid(pid), PidState::Alive);
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_counts_as_running() {
        let state = classify_probe_errno(Some(libc::EPERM));
        assert_eq!(state, PidState::Inaccessible);
        assert!(state.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_other_probe_errors_count_as_gone() {
        assert_eq!(classify_probe_errno(Some(libc::ESRCH)), PidState::Gone);
        assert_eq!(classify_probe_errno(Some(libc::EINVAL)), PidState::Gone);
        assert_eq!(classify_probe_errno(None), PidState::Gone);
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_out_of_range_pid_is_gone() {
        // i32::MAX exceeds the kernel pid range; kill() returns ESRCH.
        assert_eq!(probe_pid(i32::MAX), PidState::Gone);
    }

    #[cfg(unix)]
    #[test]
    fn test_instance_without_socket_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        let pid = std::process::id();
        std::fs::create_dir_all(temp.path().join(format!("passenger.{pid}/info"))).unwrap();
        assert!(discover(temp.path()).is_empty());
    }
}
