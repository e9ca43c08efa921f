//! Error types for the validator.

use std::path::PathBuf;
use thiserror::Error;

use crate::state::StateError;

/// Errors that can occur while scanning or validating media.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The file failed the integrity check and will not be processed.
    #[error("Integrity check failed for {path}: {reason}")]
    Integrity { path: PathBuf, reason: String },

    /// The probe tool could not be run.
    #[error("Failed to run probe at {tool}")]
    ProbeUnavailable {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input tree could not be walked.
    #[error("Failed to scan {root}: {reason}")]
    Scan { root: PathBuf, reason: String },

    /// Checksum computation failed.
    #[error(transparent)]
    Checksum(#[from] StateError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ValidatorError {
    /// Creates an integrity error.
    pub fn integrity(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Integrity {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error rejects the file itself rather than the environment.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }
}
