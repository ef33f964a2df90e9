//! Pluggable execution policies over a queue.
//!
//! A strategy drives one run of a queue: it dispatches items to a worker
//! pool under the queue's concurrency bound, records per-item outcomes, and
//! finalizes the queue status. Three policies exist:
//! - [`StandardStrategy`]: semaphore-gated per-item dispatch, streaming
//!   results in completion order
//! - [`MemoryOptimizedStrategy`]: Standard plus memory-pressure checks
//!   around every conversion under one run-scoped budget
//! - [`ParallelProcessStrategy`]: whole-batch submission to a worker pool,
//!   emitting only after the entire sub-batch completes

mod memory_optimized;
mod parallel;
mod standard;

pub use memory_optimized::MemoryOptimizedStrategy;
pub use parallel::ParallelProcessStrategy;
pub use standard::StandardStrategy;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use async_trait::async_trait;
use tokio_stream::wrappers::ReceiverStream;

use crate::core::{ConversionResult, ProcessingOptions, ProcessingQueue};
use crate::utils::ConverterResult;

/// Blocking per-file conversion function supplied by the caller.
///
/// Runs on a worker pool, never on the scheduler thread. Errors and panics
/// are converted into failed results; they never abort the batch.
pub type ProcessorFn =
    Arc<dyn Fn(&str, &ProcessingOptions) -> ConverterResult<ConversionResult> + Send + Sync>;

/// Lazy, finite, completion-ordered sequence of per-file results.
pub type ResultStream = ReceiverStream<ConversionResult>;

/// Execution policy over a queue.
///
/// A run is finite and not restartable: re-executing a queue only covers
/// items that were not yet terminal at run start (retries require
/// re-enqueuing). Cancellation flows through the queue's flag, observed
/// before each dispatch.
#[async_trait]
pub trait ProcessingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        queue: Arc<ProcessingQueue>,
        processor: ProcessorFn,
    ) -> ConverterResult<ResultStream>;
}

/// Runs the processor for one file, containing failures.
///
/// An `Err` or a panic from the processor becomes a failed result carrying
/// the message, so one bad file never takes the batch down.
pub(crate) fn run_processor(
    processor: &ProcessorFn,
    file_path: &str,
    options: &ProcessingOptions,
) -> ConversionResult {
    match catch_unwind(AssertUnwindSafe(|| processor(file_path, options))) {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => ConversionResult::failed(file_path, e.to_string()),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "processor panicked".to_string());
            ConversionResult::failed(file_path, message)
        }
    }
}
