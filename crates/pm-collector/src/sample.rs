//! Gauge samples and their collectd exec-plugin text encoding.
//!
//! ```text
//! PUTVAL "web-1/passenger/gauge-active" interval=10 N:2
//! ```

use std::io::Write;
use std::time::Duration;

/// Plugin name used in every sample identifier.
pub const PLUGIN_NAME: &str = "passenger";

/// collectd type of every sample.
pub const SAMPLE_TYPE: &str = "gauge";

/// One metric value ready for emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaugeSample {
    pub host: String,
    /// Metric name (collectd type instance)
    pub type_instance: String,
    pub interval: Duration,
    pub value: i64,
}

impl GaugeSample {
    /// `host/plugin/type-instance` identifier.
    pub fn identifier(&self) -> String {
        format!(
            "{}/{PLUGIN_NAME}/{SAMPLE_TYPE}-{}",
            self.host, self.type_instance
        )
    }

    /// Encode as a `PUTVAL` line without the trailing newline.
    pub fn to_putval(&self) -> String {
        format!(
            "PUTVAL \"{}\" interval={} N:{}",
            self.identifier(),
            self.interval.as_secs().max(1),
            self.value
        )
    }
}

/// Destination for dispatched samples.
pub trait SampleSink {
    fn dispatch(&mut self, sample: &GaugeSample) -> std::io::Result<()>;
}

/// Writes samples as `PUTVAL` lines.
pub struct PutvalWriter<W: Write> {
    out: W,
}

impl<W: Write> PutvalWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SampleSink for PutvalWriter<W> {
    fn dispatch(&mut self, sample: &GaugeSample) -> std::io::Result<()> {
        writeln!(self.out, "{}", sample.to_putval())?;
        // collectd reads line by line from a pipe
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, value: i64) -> GaugeSample {
        GaugeSample {
            host: "web-1".to_string(),
            type_instance: name.to_string(),
            interval: Duration::from_secs(10),
            value,
        }
    }

    #[test]
    fn test_identifier() {
        assert_eq!(sample("active", 2).identifier(), "web-1/passenger/gauge-active");
    }

    #[test]
    fn test_putval_line() {
        assert_eq!(
            sample("queued", 0).to_putval(),
            "PUTVAL \"web-1/passenger/gauge-queued\" interval=10 N:0"
        );
    }

    #[test]
    fn test_sub_second_interval_is_reported_as_one() {
        let mut s = sample("count", 3);
        s.interval = Duration::from_millis(200);
        assert!(s.to_putval().contains("interval=1 "));
    }

    #[test]
    fn test_writer_emits_one_line_per_sample() {
        let mut writer = PutvalWriter::new(Vec::new());
        writer.dispatch(&sample("active", 2)).unwrap();
        writer.dispatch(&sample("count", -1)).unwrap();

        let out = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "PUTVAL \"web-1/passenger/gauge-active\" interval=10 N:2",
                "PUTVAL \"web-1/passenger/gauge-count\" interval=10 N:-1",
            ]
        );
    }
}
