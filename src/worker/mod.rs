//! Bounded worker pools for blocking conversion work.
//!
//! Two independent pools keep blocking transforms off the async scheduler:
//! [`IoWorkerPool`] multiplexes many lightweight I/O-bound jobs over
//! `spawn_blocking`, [`CpuWorkerPool`] runs compute-heavy jobs on a
//! dedicated set of OS threads.

mod cpu_pool;
mod pool;

pub use cpu_pool::CpuWorkerPool;
pub use pool::IoWorkerPool;

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_WORKER_SLOT: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static WORKER_SLOT: u64 = NEXT_WORKER_SLOT.fetch_add(1, Ordering::Relaxed);
}

/// Stable synthesized identity for the calling worker thread.
///
/// Pool threads come and go (blocking-pool reuse, generation swaps on
/// resize), so stats are keyed by this slot id plus the pool role rather
/// than any OS handle.
pub(crate) fn worker_slot() -> u64 {
    WORKER_SLOT.with(|slot| *slot)
}

/// Default size for the I/O-bound pool.
pub fn default_io_workers() -> usize {
    (num_cpus::get() + 4).min(32)
}

/// Default size for the CPU-bound pool, leaving one core for the scheduler.
pub fn default_cpu_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}
