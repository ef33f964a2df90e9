//! System metrics sampling and per-worker statistics.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use sysinfo::System;
use tracing::debug;

/// Which worker pool a worker identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Thread-level pool for I/O-bound work
    Io,
    /// Dedicated compute pool for CPU-bound work
    Cpu,
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "io"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// One sampling of system load.
#[derive(Debug, Clone, Copy)]
pub struct SystemSample {
    /// Average CPU utilization across cores, 0-100
    pub cpu_percent: f32,
    /// Used memory as a share of total, 0-100
    pub memory_percent: f32,
    /// Available memory in bytes
    pub available_memory: u64,
}

impl SystemSample {
    /// Neutral fallback used when sampling fails: neither triggers growth
    /// backoff nor looks idle enough to be meaningless.
    pub fn neutral() -> Self {
        Self {
            cpu_percent: 50.0,
            memory_percent: 50.0,
            available_memory: 0,
        }
    }
}

/// Read-only source of system load metrics.
///
/// The controller consumes this through a trait so tests can inject fixed
/// values; sampling failure is represented as `None` and degrades to
/// [`SystemSample::neutral`].
pub trait SystemMetricsSource: Send + Sync {
    fn sample(&self) -> Option<SystemSample>;
}

/// Live system metrics backed by `sysinfo`.
pub struct SysinfoMetrics {
    sys: Mutex<System>,
}

impl SysinfoMetrics {
    pub fn new() -> Self {
        let mut sys = System::new();
        // Prime the CPU counters; usage numbers need a baseline refresh
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self {
            sys: Mutex::new(sys),
        }
    }
}

impl Default for SysinfoMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMetricsSource for SysinfoMetrics {
    fn sample(&self) -> Option<SystemSample> {
        let mut sys = self.sys.lock();
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let cpus = sys.cpus();
        if cpus.is_empty() {
            return None;
        }
        let cpu_percent = cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32;

        let total = sys.total_memory();
        if total == 0 {
            return None;
        }
        let memory_percent = (sys.used_memory() as f32 / total as f32) * 100.0;

        Some(SystemSample {
            cpu_percent,
            memory_percent,
            available_memory: sys.available_memory(),
        })
    }
}

/// Per-worker counters, keyed by a synthesized worker identity.
///
/// Input to the concurrency controller's heuristic only, never
/// authoritative for correctness.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    pub tasks_completed: u64,
    /// Cumulative busy time in seconds
    pub total_processing_time: f64,
    pub errors: u64,
    pub last_task_at: Option<Instant>,
}

/// Shared registry of worker statistics across both pools.
#[derive(Default)]
pub struct WorkerStatsRegistry {
    workers: Mutex<HashMap<String, (PoolKind, WorkerStats)>>,
}

impl WorkerStatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished task against the worker identity `<kind>-<id>`.
    pub fn record_completion(&self, kind: PoolKind, worker_id: u64, busy: Duration, success: bool) {
        let key = format!("{}-{}", kind, worker_id);
        let mut workers = self.workers.lock();
        let entry = workers.entry(key).or_insert_with(|| (kind, WorkerStats::default()));
        entry.1.tasks_completed += 1;
        entry.1.total_processing_time += busy.as_secs_f64();
        if !success {
            entry.1.errors += 1;
        }
        entry.1.last_task_at = Some(Instant::now());
    }

    /// Observed throughput for one pool: tasks per busy-second, summed over
    /// its tracked workers. Zero when nothing has completed yet.
    pub fn throughput(&self, kind: PoolKind) -> f64 {
        let workers = self.workers.lock();
        let (tasks, time) = workers
            .values()
            .filter(|(k, _)| *k == kind)
            .fold((0u64, 0f64), |(tasks, time), (_, stats)| {
                (tasks + stats.tasks_completed, time + stats.total_processing_time)
            });
        if time > 0.0 {
            let throughput = tasks as f64 / time;
            debug!("Throughput for {} pool: {:.2} tasks/s over {} workers", kind, throughput,
                workers.values().filter(|(k, _)| *k == kind).count());
            throughput
        } else {
            0.0
        }
    }

    pub fn snapshot(&self, kind: PoolKind) -> Vec<WorkerStats> {
        self.workers
            .lock()
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, stats)| stats.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_accumulate_per_worker() {
        let registry = WorkerStatsRegistry::new();
        registry.record_completion(PoolKind::Io, 1, Duration::from_millis(100), true);
        registry.record_completion(PoolKind::Io, 1, Duration::from_millis(100), false);
        registry.record_completion(PoolKind::Io, 2, Duration::from_millis(200), true);

        let stats = registry.snapshot(PoolKind::Io);
        assert_eq!(stats.len(), 2);
        let total_tasks: u64 = stats.iter().map(|s| s.tasks_completed).sum();
        let total_errors: u64 = stats.iter().map(|s| s.errors).sum();
        assert_eq!(total_tasks, 3);
        assert_eq!(total_errors, 1);
    }

    #[test]
    fn pools_are_tracked_independently() {
        let registry = WorkerStatsRegistry::new();
        registry.record_completion(PoolKind::Io, 1, Duration::from_millis(100), true);
        registry.record_completion(PoolKind::Cpu, 1, Duration::from_millis(100), true);

        assert_eq!(registry.snapshot(PoolKind::Io).len(), 1);
        assert_eq!(registry.snapshot(PoolKind::Cpu).len(), 1);
    }

    #[test]
    fn throughput_is_zero_before_any_completion() {
        let registry = WorkerStatsRegistry::new();
        assert_eq!(registry.throughput(PoolKind::Cpu), 0.0);
    }

    #[test]
    fn throughput_reflects_tasks_per_busy_second() {
        let registry = WorkerStatsRegistry::new();
        // 4 tasks over 2 busy-seconds
        for _ in 0..4 {
            registry.record_completion(PoolKind::Cpu, 7, Duration::from_millis(500), true);
        }
        let throughput = registry.throughput(PoolKind::Cpu);
        assert!((throughput - 2.0).abs() < 0.01, "got {}", throughput);
    }
}
