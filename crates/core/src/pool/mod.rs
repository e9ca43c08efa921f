//! Bounded worker pool for running batch tasks.
//!
//! The pool runs at most `n` tasks at a time. Submitting blocks until a
//! worker slot frees up, the pool is closed, or the caller's cancellation
//! token fires. Task errors never stop other tasks; every one of them is
//! kept and handed back by [`WorkerPool::wait_with_errors`].
//!
//! # Example
//!
//! ```ignore
//! use refinery_core::pool::WorkerPool;
//! use tokio_util::sync::CancellationToken;
//!
//! let pool: WorkerPool<String> = WorkerPool::new(4)?;
//! let cancel = CancellationToken::new();
//!
//! for name in ["a.mp3", "b.mp3"] {
//!     pool.submit(&cancel, async move {
//!         Err(format!("failed: {}", name))
//!     })
//!     .await?;
//! }
//!
//! let errors = pool.wait_with_errors().await;
//! assert_eq!(errors.len(), 2);
//! ```

mod error;
mod worker_pool;

pub use error::PoolError;
pub use worker_pool::WorkerPool;
