//! Periodic collection loop.
//!
//! Each tick runs one [`collect_stats`] cycle on the blocking pool and
//! dispatches the result as gauge samples. Polls share no state, so a poll
//! abandoned on shutdown cannot affect anything that follows.

use crate::sample::{GaugeSample, PLUGIN_NAME, SampleSink};
use passenger_monitor_core::{Metrics, MonitorConfig, collect_stats};
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Environment variable collectd's exec plugin sets to the configured host name.
pub const COLLECTD_HOSTNAME_ENV: &str = "COLLECTD_HOSTNAME";

/// Errors that stop the collector
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("failed to emit sample: {0}")]
    Emit(#[source] std::io::Error),
}

/// Pick the host part of sample identifiers.
///
/// Precedence: configured name, `COLLECTD_HOSTNAME`, system hostname, `localhost`.
pub fn resolve_hostname(configured: Option<&str>) -> String {
    if let Some(name) = configured {
        return name.to_string();
    }

    if let Ok(name) = std::env::var(COLLECTD_HOSTNAME_ENV)
        && !name.trim().is_empty()
    {
        return name.trim().to_string();
    }

    match hostname::get() {
        Ok(name) => name.to_string_lossy().to_string(),
        Err(e) => {
            warn!("Failed to get hostname, using 'localhost': {e}");
            "localhost".to_string()
        }
    }
}

/// Collector bound to one resolved configuration
pub struct Collector {
    config: Arc<MonitorConfig>,
    host: String,
}

impl Collector {
    pub fn new(config: MonitorConfig, host: impl Into<String>) -> Self {
        Self {
            config: Arc::new(config),
            host: host.into(),
        }
    }

    /// Run one poll synchronously and dispatch its samples.
    ///
    /// Returns the number of samples written.
    pub fn read_once<S: SampleSink>(&self, sink: &mut S) -> Result<usize, CollectorError> {
        debug!("beginning read callback");
        let metrics = collect_stats(&self.config);
        self.dispatch(metrics, sink)
    }

    /// Dispatch one poll result. An empty result writes nothing.
    pub fn dispatch<S: SampleSink>(
        &self,
        metrics: Metrics,
        sink: &mut S,
    ) -> Result<usize, CollectorError> {
        if metrics.is_empty() {
            warn!("{PLUGIN_NAME}: No data received");
            return Ok(0);
        }

        let count = metrics.len();
        for (name, value) in metrics {
            let sample = GaugeSample {
                host: self.host.clone(),
                type_instance: name,
                interval: self.config.interval,
                value,
            };
            sink.dispatch(&sample).map_err(CollectorError::Emit)?;
        }
        Ok(count)
    }

    /// Poll every `interval` until `cancel` fires.
    pub async fn run<S: SampleSink>(
        &self,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> Result<(), CollectorError> {
        info!(
            "Polling Passenger in '{}' every {:?}",
            self.config.temp_dir.display(),
            self.config.interval
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    debug!("beginning read callback");
                    let config = Arc::clone(&self.config);
                    let poll = tokio::task::spawn_blocking(move || collect_stats(&config));

                    let metrics = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            warn!("Abandoning in-flight poll on shutdown");
                            break;
                        }
                        joined = poll => match joined {
                            Ok(metrics) => metrics,
                            Err(e) => {
                                error!("Poll task failed: {e}");
                                continue;
                            }
                        },
                    };

                    self.dispatch(metrics, sink)?;
                }
            }
        }

        info!("Collector stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct RecordingSink {
        samples: Vec<GaugeSample>,
    }

    impl SampleSink for RecordingSink {
        fn dispatch(&mut self, sample: &GaugeSample) -> std::io::Result<()> {
            self.samples.push(sample.clone());
            Ok(())
        }
    }

    struct BrokenSink;

    impl SampleSink for BrokenSink {
        fn dispatch(&mut self, _sample: &GaugeSample) -> std::io::Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }
    }

    fn collector() -> Collector {
        let config = MonitorConfig {
            interval: Duration::from_secs(30),
            ..Default::default()
        };
        Collector::new(config, "web-1")
    }

    #[test]
    fn test_dispatch_tags_samples_with_metric_name() {
        let metrics = Metrics::from([("active".to_string(), 2), ("count".to_string(), 3)]);
        let mut sink = RecordingSink::default();

        let written = collector().dispatch(metrics, &mut sink).unwrap();
        assert_eq!(written, 2);
        assert_eq!(sink.samples[0].type_instance, "active");
        assert_eq!(sink.samples[0].value, 2);
        assert_eq!(sink.samples[1].type_instance, "count");
        assert!(sink.samples.iter().all(|s| s.host == "web-1"));
        assert!(sink.samples.iter().all(|s| s.interval == Duration::from_secs(30)));
    }

    #[test]
    #[traced_test]
    fn test_empty_metrics_emit_nothing() {
        let mut sink = RecordingSink::default();
        let written = collector().dispatch(Metrics::new(), &mut sink).unwrap();
        assert_eq!(written, 0);
        assert!(sink.samples.is_empty());
        assert!(logs_contain("passenger: No data received"));
    }

    #[test]
    fn test_sink_failure_is_reported() {
        let metrics = Metrics::from([("active".to_string(), 2)]);
        let err = collector().dispatch(metrics, &mut BrokenSink).unwrap_err();
        assert!(matches!(err, CollectorError::Emit(_)));
    }

    #[test]
    fn test_configured_hostname_wins() {
        assert_eq!(resolve_hostname(Some("db-7")), "db-7");
        assert!(!resolve_hostname(None).is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink = RecordingSink::default();
        collector().run(&mut sink, cancel).await.unwrap();
        assert!(sink.samples.is_empty());
    }
}
