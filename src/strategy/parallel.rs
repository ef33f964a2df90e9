//! Whole-batch parallel strategy.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::core::{ConversionResult, ProcessingQueue, QueueStatus};
use crate::strategy::{run_processor, ProcessingStrategy, ProcessorFn, ResultStream};
use crate::utils::ConverterResult;
use crate::worker::{CpuWorkerPool, IoWorkerPool};

/// Submits the entire pending sub-batch to a worker pool at once.
///
/// Bypasses per-item cooperative dispatch: all pending items become a flat
/// task list handed to the CPU-bound or I/O-bound pool, and nothing is
/// emitted until the whole sub-batch has completed. Cancellation is weaker
/// here — tasks already handed to a worker run to completion, only
/// not-yet-dispatched tasks are skipped.
pub struct ParallelProcessStrategy {
    io_pool: Arc<IoWorkerPool>,
    cpu_pool: Arc<CpuWorkerPool>,
    use_cpu_intensive: bool,
}

impl ParallelProcessStrategy {
    pub fn new(io_pool: Arc<IoWorkerPool>, cpu_pool: Arc<CpuWorkerPool>, use_cpu_intensive: bool) -> Self {
        Self {
            io_pool,
            cpu_pool,
            use_cpu_intensive,
        }
    }

    /// Runs the whole sub-batch and returns the materialized results.
    pub async fn execute_all(
        &self,
        queue: Arc<ProcessingQueue>,
        processor: ProcessorFn,
    ) -> ConverterResult<Vec<ConversionResult>> {
        let pending = queue.pending_items();
        if queue.is_cancelled() {
            debug!("Queue {} already cancelled, nothing to run", queue.id());
            return Ok(Vec::new());
        }

        queue.mark_started();
        info!(
            "Starting parallel run for queue {} ({} tasks on the {} pool)",
            queue.id(),
            pending.len(),
            if self.use_cpu_intensive { "cpu" } else { "io" }
        );

        // Flatten pending items into one task list and submit it whole
        let mut dispatched = Vec::with_capacity(pending.len());
        let mut handles = Vec::with_capacity(pending.len());
        for item in pending {
            if queue.is_cancelled() {
                break;
            }
            item.mark_started();
            let path = item.file_path().to_string();
            let options = item.options().clone();
            let processor = processor.clone();
            let job = move || Ok(run_processor(&processor, &path, &options));

            let handle = if self.use_cpu_intensive {
                let pool = Arc::clone(&self.cpu_pool);
                tokio::spawn(async move { pool.submit(job).await })
            } else {
                let pool = Arc::clone(&self.io_pool);
                tokio::spawn(async move { pool.submit(job).await })
            };
            dispatched.push(item);
            handles.push(handle);
        }

        // Block this call until every dispatched task has completed
        let mut outcomes = Vec::with_capacity(handles.len());
        let mut pool_error = None;
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(Ok(result)) => outcomes.push(result),
                Ok(Err(e)) => pool_error = Some(e),
                Err(e) => pool_error = Some(crate::utils::ConverterError::worker(e.to_string())),
            }
        }

        // Map results back onto items by file path
        let mut by_path: HashMap<String, Vec<ConversionResult>> = HashMap::new();
        for result in outcomes {
            by_path.entry(result.file_path.clone()).or_default().push(result);
        }

        let mut results = Vec::with_capacity(dispatched.len());
        for item in &dispatched {
            let result = by_path
                .get_mut(item.file_path())
                .and_then(|bucket| bucket.pop())
                .unwrap_or_else(|| {
                    ConversionResult::failed(item.file_path(), "No result returned from worker pool")
                });
            item.complete(result.clone());
            results.push(result);
        }

        if let Some(e) = pool_error {
            queue.finalize(QueueStatus::Error);
            return Err(e);
        }

        let status = if queue.is_cancelled() {
            QueueStatus::Cancelled
        } else {
            QueueStatus::Completed
        };
        queue.finalize(status);
        info!(
            "Queue {} parallel run finished: {} ({} results)",
            queue.id(),
            status,
            results.len()
        );
        Ok(results)
    }
}

#[async_trait]
impl ProcessingStrategy for ParallelProcessStrategy {
    fn name(&self) -> &'static str {
        "parallel-process"
    }

    async fn execute(
        &self,
        queue: Arc<ProcessingQueue>,
        processor: ProcessorFn,
    ) -> ConverterResult<ResultStream> {
        let results = self.execute_all(queue, processor).await?;
        let (tx, rx) = mpsc::channel(results.len().max(1));
        for result in results {
            // Capacity covers the whole batch; this never blocks
            let _ = tx.send(result).await;
        }
        Ok(ReceiverStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::WorkerStatsRegistry;
    use crate::core::{FileQueueItem, ProcessingOptions};
    use crate::utils::ConverterError;

    fn queue_of(paths: &[&str]) -> Arc<ProcessingQueue> {
        let items = paths
            .iter()
            .map(|p| Arc::new(FileQueueItem::new(p.to_string(), ProcessingOptions::default(), 0)))
            .collect();
        Arc::new(ProcessingQueue::new("q-par".to_string(), items, 4))
    }

    fn strategy(use_cpu: bool) -> ParallelProcessStrategy {
        let stats = Arc::new(WorkerStatsRegistry::new());
        ParallelProcessStrategy::new(
            Arc::new(IoWorkerPool::new(4, Arc::clone(&stats))),
            Arc::new(CpuWorkerPool::new(2, stats)),
            use_cpu,
        )
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

    #[tokio::test]
    async fn cpu_pool_run_completes_all_items() {
        let queue = queue_of(&["/a.png", "/b.png", "/c.png"]);
        let results = strategy(true).execute_all(queue.clone(), ok_processor()).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(queue.status(), QueueStatus::Completed);
        assert_eq!(queue.completed_count(), 3);
    }

    #[tokio::test]
    async fn io_pool_run_completes_all_items() {
        let queue = queue_of(&["/a.png", "/b.png"]);
        let results = strategy(false).execute_all(queue.clone(), ok_processor()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(queue.status(), QueueStatus::Completed);
    }

    #[tokio::test]
    async fn results_map_back_by_file_path() {
        let queue = queue_of(&["/x/one.png", "/x/two.png", "/x/three.png"]);
        let results = strategy(true).execute_all(queue.clone(), ok_processor()).await.unwrap();

        // Every item got exactly its own result
        for (item, result) in queue.items().iter().zip(&results) {
            assert_eq!(item.file_path(), result.file_path);
            assert_eq!(item.result().unwrap().file_path, result.file_path);
        }
    }

    #[tokio::test]
    async fn per_item_failure_is_contained() {
        let queue = queue_of(&["/a.png", "/bad.png"]);
        let processor: ProcessorFn = Arc::new(|path, _| {
            if path.contains("bad") {
                Err(ConverterError::processing("truncated file"))
            } else {
                Ok(ConversionResult {
                    file_path: path.to_string(),
                    success: true,
                    base64_data: None,
                    error_message: None,
                    file_size: 0,
                    processing_time: 0.0,
                })
            }
        });

        let results = strategy(true).execute_all(queue.clone(), processor).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().filter(|r| !r.success).count(), 1);
        assert_eq!(queue.status(), QueueStatus::Completed);
    }

    #[tokio::test]
    async fn cancelled_queue_runs_nothing() {
        let queue = queue_of(&["/a.png", "/b.png"]);
        queue.cancel();
        let results = strategy(true).execute_all(queue.clone(), ok_processor()).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(queue.status(), QueueStatus::Cancelled);
    }
}
