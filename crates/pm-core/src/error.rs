//! Error types for the status channel

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during a single request/response exchange
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Could not open a stream connection to the control socket
    #[error("Failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Peer closed the connection before a full frame arrived
    #[error("Connection closed after {received} of {expected} bytes")]
    ConnectionClosed { expected: usize, received: usize },

    /// Read or write did not complete within the configured timeout
    #[error("Timed out waiting for the control socket")]
    Timeout,

    /// Command payload does not fit the 16-bit length prefix
    #[error("Command of {len} bytes exceeds the frame limit of {max} bytes")]
    CommandTooLong { len: usize, max: usize },

    /// Frame bytes do not match the protocol layout
    #[error("Malformed frame: {message}")]
    MalformedFrame { message: String },

    /// Socket I/O error
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Unix domain sockets are not available on this platform
    #[error("Unix domain sockets are not supported on this platform")]
    Unsupported,
}

impl ChannelError {
    /// Classify an I/O error raised mid-exchange.
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => ChannelError::Timeout,
            _ => ChannelError::Io(err),
        }
    }
}

/// Errors from fetching and decoding the structured `status_xml` report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Malformed status XML: {message}")]
    Xml { message: String },
}
