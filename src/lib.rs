// Module declarations in dependency order
pub mod utils;
pub mod core;
pub mod queue;
pub mod concurrency;
pub mod worker;
pub mod memory;
pub mod strategy;
pub mod processing;
pub mod handler;

// Public exports for external consumers
pub use crate::core::{ConversionResult, ProcessingOptions, ProgressInfo, QueueInfo, QueueStatus};
pub use crate::handler::{HandlerConfig, MultiFileHandler};
pub use crate::processing::passthrough_processor;
pub use crate::strategy::{ProcessingStrategy, ProcessorFn, ResultStream};
pub use crate::utils::{ConverterError, ConverterResult};
