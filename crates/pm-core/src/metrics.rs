//! Conversion of a parsed status summary into integer metrics.

use crate::status::StatusSummary;
use std::collections::BTreeMap;
use tracing::debug;

/// Fields dropped before coercion. `max` is the configured pool ceiling, not a
/// live measurement.
pub const DEFAULT_IGNORED_METRICS: &[&str] = &["max"];

/// Metric name to value, ordered by name.
pub type Metrics = BTreeMap<String, i64>;

/// Keep every non-ignored field whose trimmed value parses as an integer.
///
/// Fields that fail to parse are dropped and reported at debug level; they
/// never fail the poll.
pub fn normalize<S: AsRef<str>>(summary: &StatusSummary, ignored: &[S]) -> Metrics {
    let mut metrics = Metrics::new();

    for (key, value) in summary.iter() {
        if ignored.iter().any(|name| name.as_ref() == key) {
            continue;
        }

        match value.trim().parse::<i64>() {
            Ok(n) => {
                metrics.insert(key.to_string(), n);
            }
            Err(e) => {
                debug!("Received a value of unknown type for stat '{key}' with value '{value}': {e}");
            }
        }
    }

    metrics
}
