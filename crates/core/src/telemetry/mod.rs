//! Advisory observability sinks.
//!
//! The pipeline reports counters and events through an injected
//! [`ObservabilitySink`]. Sinks never influence control flow: a sink that
//! drops everything ([`NoopSink`]) is always a valid choice.

mod metrics_sink;
mod sink;

pub use metrics_sink::PrometheusSink;
pub use sink::{FileOutcome, NoopSink, ObservabilitySink, TracingSink};
