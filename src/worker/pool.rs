//! Semaphore-bounded pool for I/O-bound blocking jobs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::concurrency::{PoolKind, WorkerStatsRegistry};
use crate::utils::{ConverterError, ConverterResult};
use crate::worker::worker_slot;

/// Bounded pool for I/O-bound blocking work.
///
/// Jobs run on the runtime's blocking threads; the concurrency bound comes
/// from the semaphore, sized to the worker count. Resizing swaps in a new
/// semaphore — jobs already holding a permit keep the old one and finish
/// undisturbed.
pub struct IoWorkerPool {
    semaphore: Mutex<Arc<Semaphore>>,
    worker_count: AtomicUsize,
    active: Arc<AtomicUsize>,
    closed: AtomicBool,
    stats: Arc<WorkerStatsRegistry>,
}

impl IoWorkerPool {
    pub fn new(worker_count: usize, stats: Arc<WorkerStatsRegistry>) -> Self {
        let worker_count = worker_count.max(1);
        debug!("Creating I/O worker pool with {} slots", worker_count);
        Self {
            semaphore: Mutex::new(Arc::new(Semaphore::new(worker_count))),
            worker_count: AtomicUsize::new(worker_count),
            active: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
            stats,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::SeqCst)
    }

    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Runs a blocking job on the pool and awaits its result.
    ///
    /// Suspends until a slot is free; the job itself executes off the
    /// scheduler thread. A panicking job surfaces as a worker error, not a
    /// crash of the run.
    pub async fn submit<F, T>(&self, job: F) -> ConverterResult<T>
    where
        F: FnOnce() -> ConverterResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = self.semaphore.lock().clone();
        let _permit = semaphore
            .acquire_owned()
            .await
            .map_err(|e| ConverterError::worker(format!("I/O pool unavailable: {}", e)))?;

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "I/O worker started - Active: {}/{}",
            active,
            self.worker_count()
        );

        let stats = Arc::clone(&self.stats);
        let outcome = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let result = job();
            stats.record_completion(PoolKind::Io, worker_slot(), start.elapsed(), result.is_ok());
            result
        })
        .await;

        self.active.fetch_sub(1, Ordering::SeqCst);

        outcome.map_err(|e| ConverterError::worker(format!("I/O worker task failed: {}", e)))?
    }

    /// Resizes the pool by replacing its semaphore.
    ///
    /// In-flight jobs keep their old permits; new submissions see the new
    /// bound immediately.
    pub fn resize(&self, worker_count: usize) {
        let worker_count = worker_count.max(1);
        if self.closed.load(Ordering::SeqCst) || worker_count == self.worker_count() {
            return;
        }
        info!("Resizing I/O worker pool to {} slots", worker_count);
        *self.semaphore.lock() = Arc::new(Semaphore::new(worker_count));
        self.worker_count.store(worker_count, Ordering::SeqCst);
    }

    /// Shuts the pool down; pending and future submissions fail with a
    /// worker error while in-flight jobs run to completion.
    pub fn shutdown(&self) {
        debug!("Shutting down I/O worker pool");
        self.closed.store(true, Ordering::SeqCst);
        self.semaphore.lock().close();
    }
}
