//! Semaphore-backed worker pool.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::error::PoolError;

/// A fixed-size pool of worker slots.
///
/// Each of the `n` semaphore permits is one worker. A submitted task only
/// starts once it holds a permit, so no more than `n` tasks ever run at the
/// same time. Submission returns after the task has been handed to a worker,
/// which gives the same rendezvous behaviour as an unbuffered channel.
pub struct WorkerPool<E> {
    workers: usize,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    closed: AtomicBool,
    errors: Arc<Mutex<Vec<E>>>,
}

impl<E: Send + 'static> WorkerPool<E> {
    /// Creates a pool with `workers` concurrent slots.
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        if workers < 1 {
            return Err(PoolError::InvalidConcurrency { requested: workers });
        }

        Ok(Self {
            workers,
            slots: Arc::new(Semaphore::new(workers)),
            tracker: TaskTracker::new(),
            closed: AtomicBool::new(false),
            errors: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Returns the configured worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns the number of tasks currently running.
    pub fn active(&self) -> usize {
        self.workers - self.slots.available_permits()
    }

    /// Whether the pool has stopped accepting tasks.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Submits a task, waiting for a free worker.
    ///
    /// Exactly one of two things happens: the task is accepted and will run,
    /// or an error is returned and the task is dropped unstarted.
    pub async fn submit<F>(&self, cancel: &CancellationToken, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        // Held until the task finishes so `wait` cannot return while a
        // submission is between acquiring a slot and spawning.
        let token = self.tracker.token();

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PoolError::Cancelled),
            permit = Arc::clone(&self.slots).acquire_owned() => {
                permit.map_err(|_| PoolError::Closed)?
            }
        };

        let errors = Arc::clone(&self.errors);
        tokio::spawn(async move {
            let result = task.await;
            if let Err(e) = result {
                errors.lock().await.push(e);
            }
            drop(permit);
            drop(token);
        });

        Ok(())
    }

    /// Stops accepting new tasks. Safe to call any number of times.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.slots.close();
            self.tracker.close();
            tracing::debug!(workers = self.workers, "Worker pool closed");
        }
    }

    /// Closes the pool and waits for every accepted task to finish.
    pub async fn wait(&self) {
        self.close();
        self.tracker.wait().await;
    }

    /// Like [`wait`](Self::wait), then returns every task error in completion order.
    pub async fn wait_with_errors(&self) -> Vec<E> {
        self.wait().await;
        std::mem::take(&mut *self.errors.lock().await)
    }
}
