//! Dedicated OS-thread pool for CPU-bound jobs.

use std::sync::Arc;
use std::time::{Duration, Instant};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::concurrency::{PoolKind, WorkerStatsRegistry};
use crate::utils::{ConverterError, ConverterResult};
use crate::worker::worker_slot;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// One spawned set of worker threads and the channel feeding them.
///
/// Replaced wholesale on resize: dropping the sender disconnects the old
/// generation, whose workers drain any queued jobs and exit on their own.
struct WorkerGeneration {
    sender: Sender<Job>,
    size: usize,
}

/// Bounded pool of dedicated OS threads for CPU-bound work.
///
/// Compute jobs run outside the async scheduler and outside the runtime's
/// blocking-thread set, so a saturated compute phase cannot starve I/O
/// work sharing the runtime.
pub struct CpuWorkerPool {
    generation: Mutex<Option<WorkerGeneration>>,
    stats: Arc<WorkerStatsRegistry>,
}

impl CpuWorkerPool {
    pub fn new(worker_count: usize, stats: Arc<WorkerStatsRegistry>) -> Self {
        let worker_count = worker_count.max(1);
        debug!(
            "Creating CPU worker pool with {} threads ({} cores available)",
            worker_count,
            num_cpus::get()
        );
        Self {
            generation: Mutex::new(Some(Self::spawn_generation(worker_count))),
            stats,
        }
    }

    fn spawn_generation(size: usize) -> WorkerGeneration {
        // Headroom of one extra queued job per worker before submission
        // backpressure kicks in
        let (sender, receiver) = bounded::<Job>(size * 2);

        for id in 0..size {
            let receiver = receiver.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("cpu-worker-{}", id))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                    debug!("CPU worker {} channel closed, shutting down", id);
                });
            if let Err(e) = spawned {
                warn!("Failed to spawn CPU worker {}: {}", id, e);
            }
        }

        WorkerGeneration { sender, size }
    }

    pub fn worker_count(&self) -> usize {
        self.generation.lock().as_ref().map_or(0, |g| g.size)
    }

    /// Runs a compute job on the pool and awaits its result.
    ///
    /// Submission backs off while the job channel is full rather than
    /// blocking the scheduler thread.
    pub async fn submit<F, T>(&self, job: F) -> ConverterResult<T>
    where
        F: FnOnce() -> ConverterResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = tokio::sync::oneshot::channel();
        let stats = Arc::clone(&self.stats);
        let mut wrapped: Job = Box::new(move || {
            let start = Instant::now();
            let result = job();
            stats.record_completion(PoolKind::Cpu, worker_slot(), start.elapsed(), result.is_ok());
            let _ = result_tx.send(result);
        });

        loop {
            let sender = {
                let generation = self.generation.lock();
                match generation.as_ref() {
                    Some(g) => g.sender.clone(),
                    None => return Err(ConverterError::worker("CPU pool is shut down")),
                }
            };

            match sender.try_send(wrapped) {
                Ok(()) => break,
                Err(TrySendError::Full(job)) => {
                    wrapped = job;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(TrySendError::Disconnected(_)) => {
                    return Err(ConverterError::worker("CPU pool workers are gone"));
                }
            }
        }

        result_rx
            .await
            .map_err(|_| ConverterError::worker("CPU worker dropped the job"))?
    }

    /// Replaces the worker set with a freshly sized one.
    ///
    /// Old workers finish their current and queued jobs, then exit when
    /// their channel disconnects; nothing blocks on them.
    pub fn resize(&self, worker_count: usize) {
        let worker_count = worker_count.max(1);
        let mut generation = self.generation.lock();
        match generation.as_ref() {
            Some(g) if g.size == worker_count => return,
            None => return,
            _ => {}
        }
        info!("Resizing CPU worker pool to {} threads", worker_count);
        *generation = Some(Self::spawn_generation(worker_count));
    }

    /// Shuts the pool down; queued jobs still drain, new submissions fail.
    pub fn shutdown(&self) {
        debug!("Shutting down CPU worker pool");
        *self.generation.lock() = None;
    }
}
