//! Mock integrity probe for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::validator::{IntegrityProbe, ValidatorError};

/// Probe that accepts every file except the ones it was told to reject.
#[derive(Debug, Default, Clone)]
pub struct MockProbe {
    rejected: HashSet<PathBuf>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects `path` as undecodable.
    pub fn reject(mut self, path: impl AsRef<Path>) -> Self {
        self.rejected.insert(path.as_ref().to_path_buf());
        self
    }
}

#[async_trait]
impl IntegrityProbe for MockProbe {
    async fn probe(&self, path: &Path) -> Result<(), ValidatorError> {
        if self.rejected.contains(path) {
            return Err(ValidatorError::integrity(path, "no decodable streams"));
        }
        Ok(())
    }
}
