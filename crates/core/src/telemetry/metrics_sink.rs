//! Prometheus-backed sink.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::sink::{FileOutcome, ObservabilitySink};

const NAMESPACE: &str = "refinery";

/// Collects pipeline metrics into its own registry.
///
/// Counters named at runtime are created on first use. A later call with a
/// different label set for the same name is ignored with a warning.
pub struct PrometheusSink {
    registry: Registry,
    files: IntCounterVec,
    file_duration: HistogramVec,
    counters: Mutex<HashMap<String, (Vec<String>, IntCounterVec)>>,
}

impl PrometheusSink {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let files = IntCounterVec::new(
            Opts::new("files_total", "Files handled by the pipeline").namespace(NAMESPACE),
            &["kind", "result"], // result: "processed", "skipped", "dry_run", "failed"
        )?;
        let file_duration = HistogramVec::new(
            HistogramOpts::new("file_duration_seconds", "Time spent on one file")
                .namespace(NAMESPACE)
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0]),
            &["kind"],
        )?;

        registry.register(Box::new(files.clone()))?;
        registry.register(Box::new(file_duration.clone()))?;

        Ok(Self {
            registry,
            files,
            file_duration,
            counters: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the registry, for merging into a wider exporter.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes every metric in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn counter_for(&self, name: &str, label_names: &[&str]) -> Option<IntCounterVec> {
        let Ok(mut counters) = self.counters.lock() else {
            return None;
        };

        if let Some((known, counter)) = counters.get(name) {
            if known.iter().map(String::as_str).eq(label_names.iter().copied()) {
                return Some(counter.clone());
            }
            tracing::warn!(counter = name, "Label set changed, ignoring increment");
            return None;
        }

        let metric_name = format!("{}_total", sanitize_metric_name(name));
        let opts = Opts::new(metric_name, name).namespace(NAMESPACE);
        let counter = IntCounterVec::new(opts, label_names)
            .and_then(|c| self.registry.register(Box::new(c.clone())).map(|_| c));

        match counter {
            Ok(counter) => {
                let names = label_names.iter().map(|s| s.to_string()).collect();
                counters.insert(name.to_string(), (names, counter.clone()));
                Some(counter)
            }
            Err(e) => {
                tracing::warn!(counter = name, error = %e, "Failed to register counter");
                None
            }
        }
    }
}

impl ObservabilitySink for PrometheusSink {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)], value: u64) {
        let names: Vec<&str> = labels.iter().map(|(k, _)| *k).collect();
        let values: Vec<&str> = labels.iter().map(|(_, v)| *v).collect();
        if let Some(counter) = self.counter_for(name, &names) {
            counter.with_label_values(&values).inc_by(value);
        }
    }

    fn record_event(&self, name: &str, _attributes: &[(&str, String)]) {
        self.increment_counter(&format!("{}_events", name), &[], 1);
    }

    fn record_file(&self, kind: &str, outcome: FileOutcome, elapsed: Duration) {
        self.files.with_label_values(&[kind, outcome.as_str()]).inc();
        if outcome == FileOutcome::Processed {
            self.file_duration
                .with_label_values(&[kind])
                .observe(elapsed.as_secs_f64());
        }
    }
}

fn sanitize_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_counters_render() {
        let sink = PrometheusSink::new().unwrap();
        sink.record_file("audio", FileOutcome::Processed, Duration::from_millis(250));
        sink.record_file("audio", FileOutcome::Failed, Duration::ZERO);

        let output = sink.render().unwrap();
        assert!(output.contains("# TYPE refinery_files_total counter"));
        assert!(output.contains(r#"refinery_files_total{kind="audio",result="processed"} 1"#));
        assert!(output.contains(r#"refinery_files_total{kind="audio",result="failed"} 1"#));
        assert!(output.contains("refinery_file_duration_seconds_count{kind=\"audio\"} 1"));
    }

    #[test]
    fn test_named_counters() {
        let sink = PrometheusSink::new().unwrap();
        sink.increment_counter("audio.processed", &[], 2);
        sink.increment_counter("audio.processed", &[], 1);
        sink.increment_counter("audio.processed", &[("extra", "x")], 5);

        let output = sink.render().unwrap();
        assert!(output.contains("refinery_audio_processed_total 3"));
    }

    #[test]
    fn test_sinks_are_independent() {
        let a = PrometheusSink::new().unwrap();
        let b = PrometheusSink::new().unwrap();
        a.record_file("video", FileOutcome::Skipped, Duration::ZERO);

        assert!(!b.render().unwrap().contains("kind=\"video\""));
    }
}
