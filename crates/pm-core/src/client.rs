//! Status accessors bound to one Passenger control socket.

use crate::channel::communicate;
use crate::error::{ChannelError, ReportError};
use crate::server_stats::{ServerStats, parse_server_stats};
use crate::status::{StatusSummary, parse_summary};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Human-readable summary command.
pub const STATUS_COMMAND: &str = "status";

/// Structured XML status command.
pub const STATUS_XML_COMMAND: &str = "status_xml";

/// Read-only client for one endpoint.
///
/// Each accessor performs its own connect/request/response/close exchange.
#[derive(Debug, Clone)]
pub struct StatusClient {
    endpoint: PathBuf,
    timeout: Duration,
}

impl StatusClient {
    pub fn new(endpoint: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &Path {
        &self.endpoint
    }

    /// Raw text of the `status` report.
    pub fn status_text(&self) -> Result<String, ChannelError> {
        self.command_text(STATUS_COMMAND)
    }

    /// XML document returned by `status_xml`.
    pub fn status_xml(&self) -> Result<String, ChannelError> {
        self.command_text(STATUS_XML_COMMAND)
    }

    /// Per-domain instance data decoded from `status_xml`.
    ///
    /// The polling path does not use this; it is exposed for ad hoc inspection.
    pub fn server_stats(&self) -> Result<ServerStats, ReportError> {
        let xml = self.status_xml()?;
        parse_server_stats(&xml)
    }

    /// Parsed summary section of the `status` report.
    ///
    /// An empty response yields an empty summary.
    pub fn server_summary(&self) -> Result<StatusSummary, ChannelError> {
        let text = self.status_text()?;
        if text.is_empty() {
            return Ok(StatusSummary::new());
        }
        Ok(parse_summary(&text))
    }

    fn command_text(&self, command: &str) -> Result<String, ChannelError> {
        let payload = communicate(&self.endpoint, command, self.timeout)?;
        Ok(String::from_utf8_lossy(&payload).into_owned())
    }
}
