//! Error types for the worker pool.

use thiserror::Error;

/// Errors returned by pool construction and task submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The requested worker count is below 1.
    #[error("Invalid concurrency {requested}: worker count must be >= 1")]
    InvalidConcurrency { requested: usize },

    /// The pool no longer accepts tasks.
    #[error("Worker pool closed")]
    Closed,

    /// The submitter's cancellation token fired before a worker accepted the task.
    #[error("Task submission cancelled")]
    Cancelled,
}

impl PoolError {
    /// Whether the caller should stop submitting further tasks.
    pub fn stops_submission(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }
}
