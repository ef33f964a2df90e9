mod manager;
mod monitor;

pub use manager::{QueueManager, QueueManagerConfig};
pub use monitor::ProgressMonitor;
