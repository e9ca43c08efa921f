//! Error types for the state manager.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing processing state.
#[derive(Debug, Error)]
pub enum StateError {
    /// No record exists for this output path.
    #[error("Not processed: {path}")]
    NotProcessed { path: PathBuf },

    /// The file to checksum could not be opened or read.
    #[error("Failed to checksum {path}")]
    ChecksumIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be written to or removed from the state directory.
    #[error("Failed to persist state record {record}")]
    Persist {
        record: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record on disk could not be parsed.
    #[error("Corrupt state record {record}")]
    Corrupt {
        record: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    /// Whether the error only means "no record yet".
    pub fn is_not_processed(&self) -> bool {
        matches!(self, Self::NotProcessed { .. })
    }
}
