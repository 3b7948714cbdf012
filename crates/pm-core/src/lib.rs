//! Core library for passenger-monitor
//!
//! Finds a running Phusion Passenger instance's control socket, exchanges one
//! length-prefixed `status` request/response over it, and turns the textual
//! report into integer metrics:
//!
//! ```text
//! locator::find_sockets -> poll::select_endpoint -> channel::communicate("status")
//!     -> status::parse_summary -> metrics::normalize
//! ```
//!
//! [`poll::collect_stats`] runs one full cycle and never fails; hosts call it
//! once per collection interval.

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod home;
pub mod locator;
pub mod logging;
pub mod metrics;
pub mod poll;
pub mod server_stats;
pub mod status;

#[cfg(all(unix, any(test, feature = "test-support")))]
pub mod testing;

pub use client::StatusClient;
pub use config::MonitorConfig;
pub use error::{ChannelError, ReportError};
pub use metrics::Metrics;
pub use poll::collect_stats;
pub use server_stats::ServerStats;
pub use status::StatusSummary;
