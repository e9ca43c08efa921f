//! Error types for processors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while converting a file.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The transcoder executable could not be started.
    #[error("Transcoder not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// The transcoder ran and failed.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The transcoder reported success but wrote nothing.
    #[error("Conversion produced no output at {path}")]
    MissingOutput { path: PathBuf },

    /// The cancellation token fired while converting.
    #[error("Conversion cancelled")]
    Cancelled,

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessorError {
    /// Creates a conversion failed error with captured stderr.
    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Whether retrying the same conversion could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
