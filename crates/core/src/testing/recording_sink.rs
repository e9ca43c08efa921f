//! Sink that keeps everything it receives.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::telemetry::ObservabilitySink;

/// Records counters and events in memory for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    counters: Mutex<HashMap<String, u64>>,
    events: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a counter.
    ///
    /// A bare name sums every label set. `name{k=v,...}` selects one set,
    /// with labels in the order they were emitted.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Names of recorded events, in order.
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|e| e.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// Attributes of the first event called `name`.
    pub fn event_attributes(&self, name: &str) -> Option<Vec<(String, String)>> {
        let events = self.events.lock().ok()?;
        events
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, attrs)| attrs.clone())
    }
}

impl ObservabilitySink for RecordingSink {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)], value: u64) {
        let Ok(mut counters) = self.counters.lock() else {
            return;
        };
        *counters.entry(name.to_string()).or_default() += value;
        if !labels.is_empty() {
            let rendered: Vec<String> =
                labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            let key = format!("{}{{{}}}", name, rendered.join(","));
            *counters.entry(key).or_default() += value;
        }
    }

    fn record_event(&self, name: &str, attributes: &[(&str, String)]) {
        if let Ok(mut events) = self.events.lock() {
            events.push((
                name.to_string(),
                attributes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            ));
        }
    }
}
