//! The processor capability.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::error::ProcessorError;
use crate::metadata::Metadata;

/// Converts input files of the kinds it accepts into one output format.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Whether this processor accepts `path`.
    fn can_process(&self, path: &Path) -> bool;

    /// Extension (without dot) of the files this processor writes.
    fn output_extension(&self) -> &str;

    /// Converts `input` into `output`.
    ///
    /// Implementations stop and return [`ProcessorError::Cancelled`] once
    /// `cancel` fires.
    async fn process(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output: &Path,
    ) -> Result<(), ProcessorError>;

    /// Like [`process`](Self::process), embedding `metadata` where supported.
    async fn process_with_metadata(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output: &Path,
        metadata: &Metadata,
    ) -> Result<(), ProcessorError> {
        let _ = metadata;
        self.process(cancel, input, output).await
    }
}
