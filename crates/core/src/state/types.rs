//! Persisted state types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Proof that an output path was produced with a given content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumRecord {
    /// Unix seconds at which the record was stored.
    pub processed_at: i64,
    /// Lowercase hex SHA-256 of the output file content.
    pub checksum: String,
    /// The output path this record describes.
    pub output_path: PathBuf,
    /// The input the output was produced from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<PathBuf>,
}
