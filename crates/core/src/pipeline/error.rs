//! Error types for the pipeline.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::pool::PoolError;
use crate::processor::ProcessorError;
use crate::state::StateError;
use crate::storage::StorageError;
use crate::validator::ValidatorError;

/// Errors raised by a pipeline run or by one file within it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The worker pool could not be created or refused a task.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The input tree could not be scanned.
    #[error("Failed to scan input directory {root}")]
    Scan {
        root: PathBuf,
        #[source]
        source: ValidatorError,
    },

    /// The file was rejected by validation.
    #[error(transparent)]
    Validation(#[from] ValidatorError),

    /// Checksum state could not be read or written.
    #[error(transparent)]
    State(#[from] StateError),

    /// The processor failed to convert the file.
    #[error(transparent)]
    Processing(#[from] ProcessorError),

    /// The file took longer than the per-file limit.
    #[error("Processing {path} timed out after {timeout:?}")]
    ProcessingTimeout { path: PathBuf, timeout: Duration },

    /// A storage mutation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The batch was cancelled before every file was submitted.
    #[error("Batch cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Whether the file itself failed integrity validation.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Validation(e) if e.is_integrity())
    }

    /// Whether the file hit the per-file time limit.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ProcessingTimeout { .. })
    }
}

/// One file that failed, with its cause.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: PipelineError,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

impl std::error::Error for FileFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
