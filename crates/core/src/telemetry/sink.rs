//! Sink trait and simple sinks.

use std::fmt;
use std::time::Duration;

/// How one file's processing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileOutcome {
    Processed,
    Skipped,
    DryRun,
    Failed,
}

impl FileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Skipped => "skipped",
            Self::DryRun => "dry_run",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives counters and events from the pipeline.
pub trait ObservabilitySink: Send + Sync {
    /// Adds `value` to the counter `name` with the given labels.
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)], value: u64);

    /// Records a point-in-time event.
    fn record_event(&self, name: &str, attributes: &[(&str, String)]);

    /// Records that one file finished.
    fn record_file(&self, kind: &str, outcome: FileOutcome, elapsed: Duration) {
        let _ = elapsed;
        self.increment_counter("files", &[("kind", kind), ("result", outcome.as_str())], 1);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ObservabilitySink for NoopSink {
    fn increment_counter(&self, _name: &str, _labels: &[(&str, &str)], _value: u64) {}

    fn record_event(&self, _name: &str, _attributes: &[(&str, String)]) {}
}

/// Forwards counters and events to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)], value: u64) {
        tracing::debug!(counter = name, ?labels, value, "counter");
    }

    fn record_event(&self, name: &str, attributes: &[(&str, String)]) {
        tracing::debug!(event = name, ?attributes, "event");
    }
}
