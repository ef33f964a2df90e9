//! Public facade over the batch conversion engine.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::concurrency::{
    AdaptiveConcurrencyController, ControllerConfig, PoolKind, SysinfoMetrics,
    SystemMetricsSource, WorkerStatsRegistry,
};
use crate::core::{ConversionResult, ProcessingOptions, ProgressInfo, QueueInfo};
use crate::memory::{MemoryPressure, SysinfoMemoryMonitor};
use crate::queue::{ProgressMonitor, QueueManager, QueueManagerConfig};
use crate::strategy::{
    MemoryOptimizedStrategy, ParallelProcessStrategy, ProcessingStrategy, ProcessorFn,
    ResultStream, StandardStrategy,
};
use crate::utils::{ConverterError, ConverterResult};
use crate::worker::{default_cpu_workers, default_io_workers, CpuWorkerPool, IoWorkerPool};

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub queue: QueueManagerConfig,
    /// Ceiling for the I/O-bound pool; also its starting size
    pub max_io_workers: usize,
    /// Ceiling for the CPU-bound pool; also its starting size
    pub max_cpu_workers: usize,
    /// Floor both controllers may shrink to
    pub min_workers: usize,
    /// Minimum time between controller step changes
    pub adjustment_interval: Duration,
    /// Optional per-item deadline; `None` lets a hung transform occupy its
    /// slot indefinitely
    pub item_timeout: Option<Duration>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            queue: QueueManagerConfig::default(),
            max_io_workers: default_io_workers(),
            max_cpu_workers: default_cpu_workers(),
            min_workers: 1,
            adjustment_interval: Duration::from_secs(30),
            item_timeout: None,
        }
    }
}

/// Facade composing queues, strategies, pools, and controllers into the
/// public surface: enqueue, process, cancel, query progress and statistics.
///
/// All components are explicitly constructed and owned here — there is no
/// global state — and [`shutdown`](Self::shutdown) tears the pools down.
/// One I/O pool is shared across all standard and memory-optimized runs, so
/// back-pressure between batches is bounded by the pool's capacity.
pub struct MultiFileHandler {
    config: HandlerConfig,
    manager: Arc<QueueManager>,
    monitor: ProgressMonitor,
    stats: Arc<WorkerStatsRegistry>,
    io_pool: Arc<IoWorkerPool>,
    cpu_pool: Arc<CpuWorkerPool>,
    io_controller: AdaptiveConcurrencyController,
    cpu_controller: AdaptiveConcurrencyController,
    memory_monitor: Option<Arc<dyn MemoryPressure>>,
}

impl MultiFileHandler {
    pub fn new(config: HandlerConfig) -> Self {
        Self::with_metrics(config, Arc::new(SysinfoMetrics::new()))
    }

    /// Builds the handler with an injected metrics source (used by tests
    /// and callers with their own sampling infrastructure).
    pub fn with_metrics(config: HandlerConfig, metrics: Arc<dyn SystemMetricsSource>) -> Self {
        let stats = Arc::new(WorkerStatsRegistry::new());
        let manager = Arc::new(QueueManager::new(config.queue.clone()));

        let mut io_cfg = ControllerConfig::new(config.min_workers, config.max_io_workers);
        io_cfg.adjustment_interval = config.adjustment_interval;
        let mut cpu_cfg = ControllerConfig::new(config.min_workers, config.max_cpu_workers);
        cpu_cfg.adjustment_interval = config.adjustment_interval;

        info!(
            "Creating handler: io pool {} workers, cpu pool {} workers",
            config.max_io_workers, config.max_cpu_workers
        );

        Self {
            manager: Arc::clone(&manager),
            monitor: ProgressMonitor::new(manager),
            io_pool: Arc::new(IoWorkerPool::new(config.max_io_workers, Arc::clone(&stats))),
            cpu_pool: Arc::new(CpuWorkerPool::new(config.max_cpu_workers, Arc::clone(&stats))),
            io_controller: AdaptiveConcurrencyController::with_initial(
                PoolKind::Io,
                io_cfg,
                Arc::clone(&metrics),
                config.max_io_workers,
            ),
            cpu_controller: AdaptiveConcurrencyController::with_initial(
                PoolKind::Cpu,
                cpu_cfg,
                metrics,
                config.max_cpu_workers,
            ),
            stats,
            memory_monitor: None,
            config,
        }
    }

    /// Injects a memory-pressure collaborator used by optimized runs
    /// instead of the built-in sysinfo monitor.
    pub fn with_memory_monitor(mut self, monitor: Arc<dyn MemoryPressure>) -> Self {
        self.memory_monitor = Some(monitor);
        self
    }

    /// Enqueues a batch of files for conversion.
    pub fn add_to_queue(
        &self,
        files: Vec<String>,
        options: ProcessingOptions,
        priority: i32,
        max_concurrent: usize,
    ) -> ConverterResult<String> {
        self.manager.create_queue(files, options, priority, max_concurrent)
    }

    /// Processes a queue with the standard strategy, streaming results in
    /// completion order.
    pub async fn process_queue(
        &self,
        queue_id: &str,
        processor: ProcessorFn,
    ) -> ConverterResult<ResultStream> {
        let queue = self
            .manager
            .get_queue(queue_id)
            .ok_or_else(|| ConverterError::not_found(queue_id))?;
        self.tune_io_pool();

        let strategy = StandardStrategy::new(Arc::clone(&self.io_pool), self.config.item_timeout);
        strategy.execute(queue, processor).await
    }

    /// Processes a queue with memory-pressure checks around every item,
    /// under one run-scoped budget of `max_memory_mb`.
    pub async fn process_queue_optimized(
        &self,
        queue_id: &str,
        processor: ProcessorFn,
        max_memory_mb: u64,
    ) -> ConverterResult<ResultStream> {
        let queue = self
            .manager
            .get_queue(queue_id)
            .ok_or_else(|| ConverterError::not_found(queue_id))?;
        self.tune_io_pool();

        let monitor = self
            .memory_monitor
            .clone()
            .unwrap_or_else(|| Arc::new(SysinfoMemoryMonitor::new(max_memory_mb)));
        let standard = StandardStrategy::new(Arc::clone(&self.io_pool), self.config.item_timeout);
        let strategy = MemoryOptimizedStrategy::new(standard, Some(monitor));
        strategy.execute(queue, processor).await
    }

    /// Processes a queue as one flat sub-batch, blocking until every
    /// dispatched task has completed. Returns the materialized results.
    pub async fn process_queue_parallel(
        &self,
        queue_id: &str,
        processor: ProcessorFn,
        use_cpu_intensive: bool,
    ) -> ConverterResult<Vec<ConversionResult>> {
        let queue = self
            .manager
            .get_queue(queue_id)
            .ok_or_else(|| ConverterError::not_found(queue_id))?;
        if use_cpu_intensive {
            self.tune_cpu_pool();
        } else {
            self.tune_io_pool();
        }

        let strategy = ParallelProcessStrategy::new(
            Arc::clone(&self.io_pool),
            Arc::clone(&self.cpu_pool),
            use_cpu_intensive,
        );
        strategy.execute_all(queue, processor).await
    }

    /// Requests cancellation of a queue's run.
    ///
    /// Returns true when the request took effect (the queue exists and was
    /// not already terminal). In-flight items finish; unstarted items are
    /// skipped.
    pub fn cancel_processing(&self, queue_id: &str) -> bool {
        match self.manager.get_queue(queue_id) {
            Some(queue) => queue.cancel(),
            None => false,
        }
    }

    pub fn get_progress(&self, queue_id: &str) -> Option<ProgressInfo> {
        self.monitor.get_progress(queue_id)
    }

    pub fn get_queue_info(&self, queue_id: &str) -> Option<QueueInfo> {
        self.manager.get_queue_info(queue_id)
    }

    pub fn get_all_queues(&self) -> Vec<QueueInfo> {
        self.manager.get_all_queues()
    }

    /// Removes terminal queues older than `max_age`; returns the count
    /// removed.
    pub fn cleanup_completed_queues(&self, max_age: Duration) -> usize {
        self.manager.cleanup_old_queues(max_age)
    }

    /// Tears down both worker pools. In-flight work finishes; subsequent
    /// processing calls fail with a worker error.
    pub fn shutdown(&self) {
        info!("Shutting down conversion engine");
        self.io_pool.shutdown();
        self.cpu_pool.shutdown();
    }

    fn tune_io_pool(&self) {
        let throughput = self.stats.throughput(PoolKind::Io);
        let target = self.io_controller.target_workers(throughput);
        if target != self.io_pool.worker_count() {
            debug!("Controller moved io pool target to {}", target);
            self.io_pool.resize(target);
        }
    }

    fn tune_cpu_pool(&self) {
        let throughput = self.stats.throughput(PoolKind::Cpu);
        let target = self.cpu_controller.target_workers(throughput);
        if target != self.cpu_pool.worker_count() {
            debug!("Controller moved cpu pool target to {}", target);
            self.cpu_pool.resize(target);
        }
    }
}

impl Default for MultiFileHandler {
    fn default() -> Self {
        Self::new(HandlerConfig::default())
    }
}
