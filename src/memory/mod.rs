//! Memory-pressure service consulted by the memory-optimized strategy.

use std::sync::Arc;
use parking_lot::Mutex;
use sysinfo::System;
use tracing::{debug, warn};

/// External memory-pressure collaborator.
///
/// Consulted opportunistically around each conversion call; when no
/// implementation is supplied, the memory-optimized strategy degrades to
/// standard behavior.
pub trait MemoryPressure: Send + Sync {
    /// Pre-call check against configured thresholds.
    fn check_thresholds(&self);
    /// Cheap post-call reclamation pass.
    fn reclaim(&self);
}

/// Default monitor backed by `sysinfo`, honoring a fixed memory budget.
pub struct SysinfoMemoryMonitor {
    sys: Mutex<System>,
    max_memory_bytes: u64,
}

impl SysinfoMemoryMonitor {
    pub fn new(max_memory_mb: u64) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        Self {
            sys: Mutex::new(sys),
            max_memory_bytes: max_memory_mb * 1024 * 1024,
        }
    }

    /// True when available memory has dropped below the configured budget.
    pub fn under_pressure(&self) -> bool {
        let mut sys = self.sys.lock();
        sys.refresh_memory();
        sys.available_memory() < self.max_memory_bytes
    }
}

impl MemoryPressure for SysinfoMemoryMonitor {
    fn check_thresholds(&self) {
        let mut sys = self.sys.lock();
        sys.refresh_memory();
        let available = sys.available_memory();
        if available < self.max_memory_bytes {
            warn!(
                "Available memory {}MB below budget {}MB",
                available / (1024 * 1024),
                self.max_memory_bytes / (1024 * 1024)
            );
        }
    }

    fn reclaim(&self) {
        // The engine holds no reclaimable caches itself; implementations
        // wrapping a cache layer drop entries here.
        debug!("Memory reclamation pass");
    }
}

/// Run-scoped memory-budget context.
///
/// One budget is established per queue run and released when the run ends,
/// whether it finishes normally or unwinds — release rides on `Drop`.
pub struct MemoryBudget {
    monitor: Option<Arc<dyn MemoryPressure>>,
}

impl MemoryBudget {
    pub fn acquire(monitor: Option<Arc<dyn MemoryPressure>>) -> Self {
        if let Some(monitor) = &monitor {
            monitor.check_thresholds();
        }
        Self { monitor }
    }
}

impl Drop for MemoryBudget {
    fn drop(&mut self) {
        if let Some(monitor) = &self.monitor {
            monitor.reclaim();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

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

    #[test]
    fn budget_checks_on_acquire_and_reclaims_on_release() {
        let monitor = Arc::new(CountingMonitor::default());
        {
            let _budget = MemoryBudget::acquire(Some(monitor.clone()));
            assert_eq!(monitor.checks.load(Ordering::SeqCst), 1);
            assert_eq!(monitor.reclaims.load(Ordering::SeqCst), 0);
        }
        assert_eq!(monitor.reclaims.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn budget_releases_on_unwind() {
        let monitor = Arc::new(CountingMonitor::default());
        let cloned = monitor.clone();
        let result = std::panic::catch_unwind(move || {
            let _budget = MemoryBudget::acquire(Some(cloned));
            panic!("run failed");
        });
        assert!(result.is_err());
        assert_eq!(monitor.reclaims.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn absent_monitor_degrades_gracefully() {
        let _budget = MemoryBudget::acquire(None);
    }
}
