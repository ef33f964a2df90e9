//! Memory-aware decoration of the standard strategy.

use std::sync::Arc;
use async_trait::async_trait;
use tracing::debug;

use crate::core::ProcessingQueue;
use crate::memory::{MemoryBudget, MemoryPressure};
use crate::strategy::{ProcessingStrategy, ProcessorFn, ResultStream, StandardStrategy};
use crate::utils::ConverterResult;

/// Standard execution with memory-pressure checks around every conversion.
///
/// One shared memory budget is established for the whole queue run and
/// released when the run ends; around each call, the processor is wrapped
/// with a pre-call threshold check and a post-call reclamation pass.
/// Without a pressure monitor this degrades to plain standard behavior.
pub struct MemoryOptimizedStrategy {
    inner: StandardStrategy,
    monitor: Option<Arc<dyn MemoryPressure>>,
}

impl MemoryOptimizedStrategy {
    pub fn new(inner: StandardStrategy, monitor: Option<Arc<dyn MemoryPressure>>) -> Self {
        Self { inner, monitor }
    }

    fn wrap_processor(&self, processor: ProcessorFn) -> ProcessorFn {
        let Some(monitor) = self.monitor.clone() else {
            return processor;
        };
        Arc::new(move |path, options| {
            monitor.check_thresholds();
            let result = processor(path, options);
            monitor.reclaim();
            result
        })
    }
}

#[async_trait]
impl ProcessingStrategy for MemoryOptimizedStrategy {
    fn name(&self) -> &'static str {
        "memory-optimized"
    }

    async fn execute(
        &self,
        queue: Arc<ProcessingQueue>,
        processor: ProcessorFn,
    ) -> ConverterResult<ResultStream> {
        if self.monitor.is_none() {
            debug!(
                "No memory monitor configured, queue {} falls back to standard behavior",
                queue.id()
            );
        }
        let budget = MemoryBudget::acquire(self.monitor.clone());
        let wrapped = self.wrap_processor(processor);
        self.inner.run(queue, wrapped, Some(budget)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::WorkerStatsRegistry;
    use crate::core::{ConversionResult, FileQueueItem, ProcessingOptions, QueueStatus};
    use crate::worker::IoWorkerPool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_stream::StreamExt;

    #[derive(Default)]
    struct CountingMonitor {
        checks: AtomicUsize,
        reclaims: AtomicUsize,
    }

    impl MemoryPressure for CountingMonitor {
        fn check_thresholds(&self) {
            self.checks.fetch_add(1, Ordering::SeqCst);
        }

        fn reclaim(&self) {
            self.reclaims.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn queue_of(paths: &[&str]) -> Arc<ProcessingQueue> {
        let items = paths
            .iter()
            .map(|p| Arc::new(FileQueueItem::new(p.to_string(), ProcessingOptions::default(), 0)))
            .collect();
        Arc::new(ProcessingQueue::new("q-mem".to_string(), items, 2))
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

    fn standard() -> StandardStrategy {
        let pool = Arc::new(IoWorkerPool::new(4, Arc::new(WorkerStatsRegistry::new())));
        StandardStrategy::new(pool, None)
    }

    #[tokio::test]
    async fn monitor_is_consulted_around_every_item() {
        let monitor = Arc::new(CountingMonitor::default());
        let strategy = MemoryOptimizedStrategy::new(standard(), Some(monitor.clone()));

        let queue = queue_of(&["/a.png", "/b.png", "/c.png"]);
        let stream = strategy.execute(queue.clone(), ok_processor()).await.unwrap();
        let results: Vec<_> = stream.collect().await;

        assert_eq!(results.len(), 3);
        assert_eq!(queue.status(), QueueStatus::Completed);
        // One budget check at run start plus one per item
        assert_eq!(monitor.checks.load(Ordering::SeqCst), 4);
        // One reclaim per item plus the budget release
        assert_eq!(monitor.reclaims.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn degrades_to_standard_without_monitor() {
        let strategy = MemoryOptimizedStrategy::new(standard(), None);
        let queue = queue_of(&["/a.png", "/b.png"]);
        let stream = strategy.execute(queue.clone(), ok_processor()).await.unwrap();
        let results: Vec<_> = stream.collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(queue.status(), QueueStatus::Completed);
    }
}
