//! Collector for passenger-monitor
//!
//! Thin host adapter around [`passenger_monitor_core`]: polls once per
//! interval and writes each metric as a collectd `PUTVAL` gauge line on stdout,
//! so the binary can run under collectd's exec plugin.

pub mod collector;
pub mod sample;

pub use collector::{Collector, CollectorError, resolve_hostname};
pub use sample::{GaugeSample, PutvalWriter, SampleSink};
