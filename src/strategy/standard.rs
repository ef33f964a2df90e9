//! Standard semaphore-gated streaming strategy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::core::{ConversionResult, FileQueueItem, ProcessingQueue, QueueStatus};
use crate::memory::MemoryBudget;
use crate::strategy::{run_processor, ProcessingStrategy, ProcessorFn, ResultStream};
use crate::utils::ConverterResult;
use crate::worker::IoWorkerPool;

/// Drives a queue on the cooperative scheduler with bounded concurrency.
///
/// Each non-completed item becomes one unit of work gated by a run-local
/// semaphore sized to the queue's `max_concurrent`; the unit dispatches the
/// blocking processor onto the shared I/O pool and awaits without blocking
/// other units. Results stream back in completion order.
pub struct StandardStrategy {
    pool: Arc<IoWorkerPool>,
    item_timeout: Option<Duration>,
}

impl StandardStrategy {
    pub fn new(pool: Arc<IoWorkerPool>, item_timeout: Option<Duration>) -> Self {
        Self { pool, item_timeout }
    }

    /// Starts a run, optionally holding a run-scoped guard (used by the
    /// memory-optimized decorator) that is released when the run ends.
    pub(crate) async fn run(
        &self,
        queue: Arc<ProcessingQueue>,
        processor: ProcessorFn,
        budget: Option<MemoryBudget>,
    ) -> ConverterResult<ResultStream> {
        let pending = queue.pending_items();
        let (tx, rx) = mpsc::channel(pending.len().max(1));

        if queue.is_cancelled() {
            debug!("Queue {} already cancelled, nothing to run", queue.id());
            return Ok(ReceiverStream::new(rx));
        }

        queue.mark_started();
        info!(
            "Starting standard run for queue {} ({} pending, max_concurrent {})",
            queue.id(),
            pending.len(),
            queue.max_concurrent()
        );

        let pool = Arc::clone(&self.pool);
        let item_timeout = self.item_timeout;
        tokio::spawn(async move {
            let gate = Arc::new(Semaphore::new(queue.max_concurrent()));
            let pool_failed = Arc::new(AtomicBool::new(false));
            let mut units = Vec::with_capacity(pending.len());

            for item in pending {
                // Cancellation and pool failure are both checked before
                // each dispatch; in-flight units are never preempted
                if queue.is_cancelled() || pool_failed.load(Ordering::SeqCst) {
                    break;
                }
                let permit = match gate.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                if queue.is_cancelled() {
                    break;
                }

                let pool = Arc::clone(&pool);
                let processor = processor.clone();
                let tx = tx.clone();
                let pool_failed = Arc::clone(&pool_failed);
                units.push(tokio::spawn(async move {
                    let _permit = permit;
                    item.mark_started();
                    match dispatch_item(&pool, &processor, &item, item_timeout).await {
                        Ok(result) => {
                            item.complete(result.clone());
                            let _ = tx.send(result).await;
                        }
                        Err(e) => {
                            warn!("Worker pool failure for {}: {}", item.file_path(), e);
                            pool_failed.store(true, Ordering::SeqCst);
                            let failed = ConversionResult::failed(item.file_path(), e.to_string());
                            item.complete(failed.clone());
                            let _ = tx.send(failed).await;
                        }
                    }
                }));
            }

            for unit in units {
                let _ = unit.await;
            }

            let status = if pool_failed.load(Ordering::SeqCst) {
                QueueStatus::Error
            } else if queue.is_cancelled() {
                QueueStatus::Cancelled
            } else {
                QueueStatus::Completed
            };
            queue.finalize(status);
            info!(
                "Queue {} run finished: {} ({}/{} completed, {} errors)",
                queue.id(),
                status,
                queue.completed_count(),
                queue.total_files(),
                queue.error_count()
            );
            // The channel stays buffered (capacity covers every pending
            // item), so units never block on send. The run-scoped budget is
            // released and the queue finalized before the channel closes,
            // so stream end implies a settled queue.
            drop(budget);
            drop(tx);
        });

        Ok(ReceiverStream::new(rx))
    }
}

/// Dispatches one item to the pool, applying the optional per-item timeout
/// on the await side only — a timed-out call keeps running on its worker,
/// but the slot and the result are reclaimed.
async fn dispatch_item(
    pool: &IoWorkerPool,
    processor: &ProcessorFn,
    item: &FileQueueItem,
    item_timeout: Option<Duration>,
) -> ConverterResult<ConversionResult> {
    let path = item.file_path().to_string();
    let options = item.options().clone();
    let processor = processor.clone();
    let job = move || Ok(run_processor(&processor, &path, &options));

    match item_timeout {
        None => pool.submit(job).await,
        Some(limit) => match tokio::time::timeout(limit, pool.submit(job)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "Item {} exceeded {:?}, abandoning the slot",
                    item.file_path(),
                    limit
                );
                Ok(ConversionResult::failed(
                    item.file_path(),
                    format!("Processing timed out after {:.1}s", limit.as_secs_f64()),
                ))
            }
        },
    }
}

#[async_trait]
impl ProcessingStrategy for StandardStrategy {
    fn name(&self) -> &'static str {
        "standard"
    }

    async fn execute(
        &self,
        queue: Arc<ProcessingQueue>,
        processor: ProcessorFn,
    ) -> ConverterResult<ResultStream> {
        self.run(queue, processor, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::WorkerStatsRegistry;
    use crate::core::ProcessingOptions;
    use crate::utils::ConverterError;
    use std::sync::atomic::AtomicUsize;
    use tokio_stream::StreamExt;

    fn queue_of(paths: &[&str], max_concurrent: usize) -> Arc<ProcessingQueue> {
        let items = paths
            .iter()
            .map(|p| Arc::new(FileQueueItem::new(p.to_string(), ProcessingOptions::default(), 0)))
            .collect();
        Arc::new(ProcessingQueue::new("q-std".to_string(), items, max_concurrent))
    }

    fn ok_processor() -> ProcessorFn {
        Arc::new(|path, _| {
            Ok(ConversionResult {
                file_path: path.to_string(),
                success: true,
                base64_data: Some("aGk=".to_string()),
                error_message: None,
                file_size: 2,
                processing_time: 0.001,
            })
        })
    }

    fn strategy(max_workers: usize) -> StandardStrategy {
        let pool = Arc::new(IoWorkerPool::new(max_workers, Arc::new(WorkerStatsRegistry::new())));
        StandardStrategy::new(pool, None)
    }

    #[tokio::test]
    async fn yields_one_result_per_pending_item() {
        let queue = queue_of(&["/a.png", "/b.png", "/c.png"], 2);
        let stream = strategy(4).execute(queue.clone(), ok_processor()).await.unwrap();
        let results: Vec<_> = stream.collect().await;

        assert_eq!(results.len(), 3);
        assert_eq!(queue.completed_count(), 3);
        assert_eq!(queue.status(), QueueStatus::Completed);

        // Every yielded path is a member of the enqueued set
        for result in &results {
            assert!(["/a.png", "/b.png", "/c.png"].contains(&result.file_path.as_str()));
        }
    }

    #[tokio::test]
    async fn per_item_failure_does_not_abort_the_batch() {
        let queue = queue_of(&["/a.png", "/bad.png", "/c.png"], 2);
        let processor: ProcessorFn = Arc::new(|path, _| {
            if path.contains("bad") {
                Err(ConverterError::processing("cannot decode"))
            } else {
                Ok(ConversionResult {
                    file_path: path.to_string(),
                    success: true,
                    base64_data: Some("aGk=".to_string()),
                    error_message: None,
                    file_size: 2,
                    processing_time: 0.001,
                })
            }
        });

        let stream = strategy(4).execute(queue.clone(), processor).await.unwrap();
        let results: Vec<_> = stream.collect().await;

        assert_eq!(results.len(), 3);
        let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].file_path, "/bad.png");
        assert!(!failed[0].error_message.as_deref().unwrap_or_default().is_empty());
        assert_eq!(queue.status(), QueueStatus::Completed);
        assert_eq!(queue.error_count(), 1);
    }

    #[tokio::test]
    async fn concurrency_bound_is_respected() {
        let queue = queue_of(&["/1", "/2", "/3", "/4", "/5", "/6"], 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let processor: ProcessorFn = {
            let running = running.clone();
            let peak = peak.clone();
            Arc::new(move |path, _| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(15));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(ConversionResult {
                    file_path: path.to_string(),
                    success: true,
                    base64_data: None,
                    error_message: None,
                    file_size: 0,
                    processing_time: 0.015,
                })
            })
        };

        let stream = strategy(8).execute(queue, processor).await.unwrap();
        let results: Vec<_> = stream.collect().await;
        assert_eq!(results.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2, "peak {}", peak.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancellation_skips_not_yet_dispatched_items() {
        let queue = queue_of(&["/1", "/2", "/3", "/4"], 1);
        let processor: ProcessorFn = Arc::new(|path, _| {
            std::thread::sleep(Duration::from_millis(30));
            Ok(ConversionResult {
                file_path: path.to_string(),
                success: true,
                base64_data: None,
                error_message: None,
                file_size: 0,
                processing_time: 0.03,
            })
        });

        let stream = strategy(2).execute(queue.clone(), processor).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(queue.cancel());

        let results: Vec<_> = stream.collect().await;
        assert!(results.len() < 4, "cancellation must skip pending items");
        assert_eq!(queue.status(), QueueStatus::Cancelled);
        // No result is fabricated for items that never started
        assert_eq!(queue.completed_count(), results.len());
    }

    #[tokio::test]
    async fn second_run_covers_only_unfinished_items() {
        let queue = queue_of(&["/a.png", "/b.png"], 2);
        let stream = strategy(2).execute(queue.clone(), ok_processor()).await.unwrap();
        let first: Vec<_> = stream.collect().await;
        assert_eq!(first.len(), 2);

        let stream = strategy(2).execute(queue.clone(), ok_processor()).await.unwrap();
        let second: Vec<_> = stream.collect().await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn item_timeout_reclaims_the_slot() {
        let queue = queue_of(&["/slow.png", "/fast.png"], 1);
        let processor: ProcessorFn = Arc::new(|path, _| {
            if path.contains("slow") {
                std::thread::sleep(Duration::from_millis(200));
            }
            Ok(ConversionResult {
                file_path: path.to_string(),
                success: true,
                base64_data: None,
                error_message: None,
                file_size: 0,
                processing_time: 0.0,
            })
        });

        let pool = Arc::new(IoWorkerPool::new(2, Arc::new(WorkerStatsRegistry::new())));
        let strategy = StandardStrategy::new(pool, Some(Duration::from_millis(40)));
        let stream = strategy.execute(queue.clone(), processor).await.unwrap();
        let results: Vec<_> = stream.collect().await;

        assert_eq!(results.len(), 2);
        let slow = results.iter().find(|r| r.file_path == "/slow.png").unwrap();
        assert!(!slow.success);
        assert!(slow.error_message.as_deref().unwrap().contains("timed out"));
        let fast = results.iter().find(|r| r.file_path == "/fast.png").unwrap();
        assert!(fast.success);
    }
}
