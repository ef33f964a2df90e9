//! Core entities of the conversion engine.
//!
//! This module contains the fundamental types used throughout the engine:
//! - [`ProcessingOptions`]: per-file transform parameters
//! - [`ConversionResult`]: outcome of one file conversion
//! - [`FileQueueItem`]: one file's task and lifecycle state
//! - [`ProcessingQueue`]: a batch of items tracked as one unit
//! - [`ProgressInfo`]: derived point-in-time progress snapshot

mod item;
mod progress;
mod queue;
mod types;

pub use item::FileQueueItem;
pub use progress::ProgressInfo;
pub use queue::ProcessingQueue;
pub use types::{ConversionResult, ProcessingOptions, QueueInfo, QueueStatus, ResizeOptions};
