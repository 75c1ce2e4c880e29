//! Bounded pool for CPU-heavy work (signature checks, pairings, Poseidon trees,
//! external provers), keeping it off the request-handling threads.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("worker pool is closed")]
    Closed,

    #[error("worker task failed: {0}")]
    Join(String),
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of idle slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run a blocking closure on the blocking thread pool while holding a slot.
    ///
    /// The slot stays taken until the closure returns, even if the caller
    /// stops waiting.
    pub async fn run_blocking<F, T>(&self, job: F) -> Result<T, WorkerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::Closed)?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| WorkerError::Join(e.to_string()))
    }

    /// Await `job` while holding a slot.
    pub async fn run<F>(&self, job: F) -> Result<F::Output, WorkerError>
    where
        F: Future,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| WorkerError::Closed)?;
        Ok(job.await)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(std::thread::available_parallelism().map_or(4, |n| n.get()))
    }
}
