//! Checksum-based processing state.
//!
//! Tracks which output files have been produced, and with what content, so a
//! repeat run can skip work whose result is already on disk. One JSON record
//! per output path lives in the state directory, named by the SHA-256 of the
//! path. An in-memory cache mirrors the records written or read in this run.

mod error;
mod manager;
mod types;

pub use error::StateError;
pub use manager::{calculate_checksum, StateManager};
pub use types::ChecksumRecord;
