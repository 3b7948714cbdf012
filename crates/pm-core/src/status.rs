//! Parsing of the human-readable `status` report.
//!
//! The report has no formal grammar. The summary section at the top carries
//! `key = value` lines and a `Waiting on global queue: N` line; it ends at the
//! line introducing the per-domain listing:
//!
//! ```text
//! ----------- General information -----------
//! max      = 6
//! count    = 2
//! active   = 1
//! inactive = 1
//! Waiting on global queue: 0
//!
//! ----------- Domains -----------
//! /var/www/app:
//!   PID: 1234   Sessions: 1   Processed: 42   Uptime: 3m 2s
//! ```
//!
//! Lines are fed through an ordered list of [`LineRule`]s; the first rule that
//! does not [`skip`](LineOutcome::Skip) a line decides what happens to it. New
//! report fields can be supported by appending a rule with
//! [`StatusParser::with_rule`].

/// Marker of the per-domain listing; parsing stops at the first line containing it.
pub const DOMAINS_MARKER: &str = "Domains";

/// Substring identifying the global queue line.
pub const QUEUE_MARKER: &str = "queue:";

/// Field name under which the global queue depth is recorded.
pub const QUEUE_FIELD: &str = "queued";

/// Insertion-ordered field map produced by [`StatusParser`].
///
/// Re-inserting an existing key replaces its value in place, so the key keeps
/// the position of its first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    fields: Vec<(String, String)>,
}

impl StatusSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key -> value`, overwriting an earlier value for the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StatusSummary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut summary = StatusSummary::new();
        for (k, v) in iter {
            summary.insert(k, v);
        }
        summary
    }
}

/// What a rule decided about one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// This rule does not apply; try the next one.
    Skip,
    /// Record a field and move to the next line.
    Field { key: String, value: String },
    /// Stop processing the report.
    Stop,
}

/// A single line-matching rule.
pub trait LineRule: Send + Sync {
    fn apply(&self, line: &str) -> LineOutcome;
}

/// Stops the parse at the first line containing a marker.
#[derive(Debug, Clone)]
pub struct StopAt {
    pub marker: &'static str,
}

impl LineRule for StopAt {
    fn apply(&self, line: &str) -> LineOutcome {
        if line.contains(self.marker) {
            LineOutcome::Stop
        } else {
            LineOutcome::Skip
        }
    }
}

/// `key = value` lines, split on the first `=`.
#[derive(Debug, Clone, Default)]
pub struct KeyValue;

impl LineRule for KeyValue {
    fn apply(&self, line: &str) -> LineOutcome {
        match line.split_once('=') {
            Some((key, value)) => LineOutcome::Field {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            },
            None => LineOutcome::Skip,
        }
    }
}

/// Lines containing `marker`; the text after the first `:` is recorded under `field`.
#[derive(Debug, Clone)]
pub struct FixedField {
    pub marker: &'static str,
    pub field: &'static str,
}

impl LineRule for FixedField {
    fn apply(&self, line: &str) -> LineOutcome {
        if !line.contains(self.marker) {
            return LineOutcome::Skip;
        }
        match line.split_once(':') {
            Some((_, value)) => LineOutcome::Field {
                key: self.field.to_string(),
                value: value.trim().to_string(),
            },
            None => LineOutcome::Skip,
        }
    }
}

/// Line-oriented rule engine for the status report.
pub struct StatusParser {
    rules: Vec<Box<dyn LineRule>>,
}

impl Default for StatusParser {
    /// Built-in rules: stop at `Domains`, then `key = value`, then the queue line.
    fn default() -> Self {
        Self {
            rules: vec![
                Box::new(StopAt {
                    marker: DOMAINS_MARKER,
                }),
                Box::new(KeyValue),
                Box::new(FixedField {
                    marker: QUEUE_MARKER,
                    field: QUEUE_FIELD,
                }),
            ],
        }
    }
}

impl StatusParser {
    /// Append a rule; it is consulted after every existing rule.
    pub fn with_rule(mut self, rule: impl LineRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn parse(&self, text: &str) -> StatusSummary {
        let mut summary = StatusSummary::new();

        'lines: for line in text.lines() {
            for rule in &self.rules {
                match rule.apply(line) {
                    LineOutcome::Skip => continue,
                    LineOutcome::Field { key, value } => {
                        summary.insert(key, value);
                        continue 'lines;
                    }
                    LineOutcome::Stop => break 'lines,
                }
            }
        }

        summary
    }
}

/// Parse a status report with the built-in rules.
pub fn parse_summary(text: &str) -> StatusSummary {
    StatusParser::default().parse(text)
}
