//! Mock processor for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::metadata::Metadata;
use crate::processor::{Processor, ProcessorError};

/// A recorded call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub input: PathBuf,
    pub output: PathBuf,
    pub metadata: Metadata,
}

/// Processor that writes a deterministic transform of its input.
///
/// Provides controllable behavior for testing:
/// - Records every call
/// - Simulates slow conversions (honouring cancellation)
/// - Fails for every input, or for chosen file names
/// - Tracks the highest number of calls running at once
///
/// # Example
///
/// ```rust,ignore
/// use refinery_core::testing::MockProcessor;
///
/// let processor = MockProcessor::new("to-flac", ["mp3", "wav"], "flac")
///     .failing_for("broken.mp3");
/// ```
#[derive(Debug)]
pub struct MockProcessor {
    name: String,
    accepts: Vec<String>,
    output_extension: String,
    delay: Option<Duration>,
    fail_all: bool,
    fail_names: HashSet<String>,
    calls: Mutex<Vec<RecordedCall>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl MockProcessor {
    /// Creates a processor accepting the given input extensions.
    pub fn new<'a>(
        name: &str,
        accepts: impl IntoIterator<Item = &'a str>,
        output_extension: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            accepts: accepts.into_iter().map(str::to_lowercase).collect(),
            output_extension: output_extension.to_string(),
            delay: None,
            fail_all: false,
            fail_names: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Sleeps for `delay` before writing output.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails every conversion.
    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Fails conversions of inputs with this file name.
    pub fn failing_for(mut self, file_name: &str) -> Self {
        self.fail_names.insert(file_name.to_string());
        self
    }

    /// Number of conversions attempted.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Every recorded call, in start order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Highest number of conversions that ran at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// The bytes this mock writes for a given input.
    pub fn expected_output(&self, input: &[u8]) -> Vec<u8> {
        let mut out = format!("{}:", self.name).into_bytes();
        out.extend_from_slice(input);
        out
    }

    async fn convert(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output: &Path,
    ) -> Result<(), ProcessorError> {
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProcessorError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(ProcessorError::Cancelled);
        }

        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_all || self.fail_names.contains(&file_name) {
            return Err(ProcessorError::conversion_failed(
                format!("mock failure for {}", file_name),
                None,
            ));
        }

        let bytes = tokio::fs::read(input).await?;
        tokio::fs::write(output, self.expected_output(&bytes)).await?;
        Ok(())
    }
}

#[async_trait]
impl Processor for MockProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_process(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|e| self.accepts.contains(&e))
    }

    fn output_extension(&self) -> &str {
        &self.output_extension
    }

    async fn process(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output: &Path,
    ) -> Result<(), ProcessorError> {
        self.process_with_metadata(cancel, input, output, &Metadata::default())
            .await
    }

    async fn process_with_metadata(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output: &Path,
        metadata: &Metadata,
    ) -> Result<(), ProcessorError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                metadata: metadata.clone(),
            });
        }

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = self.convert(cancel, input, output).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
