mod controller;
mod metrics;

pub use controller::{AdaptiveConcurrencyController, Adjustment, ControllerConfig};
pub use metrics::{PoolKind, SysinfoMetrics, SystemMetricsSource, SystemSample, WorkerStats, WorkerStatsRegistry};
