//! Configuration for transactional storage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for [`TransactionalStorage`](super::TransactionalStorage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Buffer size for file copies in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Whether copies are synced to stable storage before they count as done.
    #[serde(default = "default_true")]
    pub sync_writes: bool,

    /// Directory for backups of overwritten files.
    ///
    /// When unset, backups are kept next to the file they protect, which
    /// keeps the backup rename on the same filesystem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
}

fn default_buffer_size() -> usize {
    1024 * 1024 // 1 MB
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            sync_writes: true,
            backup_dir: None,
        }
    }
}

impl StorageConfig {
    /// Sets the buffer size for copies.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets the backup directory.
    pub fn with_backup_dir(mut self, path: PathBuf) -> Self {
        self.backup_dir = Some(path);
        self
    }

    /// Enables or disables syncing copies to disk.
    pub fn with_sync_writes(mut self, enabled: bool) -> Self {
        self.sync_writes = enabled;
        self
    }
}
