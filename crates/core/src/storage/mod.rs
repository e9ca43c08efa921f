//! Transactional file storage with dry-run and rollback.
//!
//! Every mutation (copy, move, directory creation) is journaled in an
//! ordered operation log. In dry-run mode the log is the only effect; in
//! live mode completed operations can be reversed with
//! [`TransactionalStorage::rollback`], newest first.
//!
//! # Features
//!
//! - Backup of existing destinations before they are overwritten
//! - Durable copies (data flushed and synced before success is reported)
//! - Atomic rename with copy-then-delete fallback for moves
//! - Removal of directories the batch created, when left empty
//! - Aggregated rollback failures that never stop the rollback loop
//!
//! # Example
//!
//! ```ignore
//! use refinery_core::storage::{StorageConfig, TransactionalStorage};
//!
//! let storage = TransactionalStorage::new(StorageConfig::default(), false);
//! storage.copy(Path::new("/in/a.flac"), Path::new("/out/music/a.flac")).await?;
//!
//! // Something later in the batch failed: undo everything.
//! storage.rollback().await?;
//! ```

mod config;
mod error;
mod transactional;
mod types;

pub use config::StorageConfig;
pub use error::StorageError;
pub use transactional::TransactionalStorage;
pub use types::{Operation, OperationKind};
