//! Batch queue entity.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use tracing::debug;

use crate::core::{FileQueueItem, QueueInfo, QueueStatus};

#[derive(Debug)]
struct QueueState {
    status: QueueStatus,
    started_at: Option<Instant>,
    completed_at: Option<Instant>,
}

/// A batch of files submitted together for conversion.
///
/// The item list is fixed at creation and exclusively owned by the active
/// strategy run; the queue itself lives in the manager's store and is shared
/// by reference. The `cancelled` flag is monotonic (false → true) and
/// immediately visible to all readers.
#[derive(Debug)]
pub struct ProcessingQueue {
    queue_id: String,
    items: Vec<Arc<FileQueueItem>>,
    max_concurrent: usize,
    created_at: Instant,
    cancelled: AtomicBool,
    state: Mutex<QueueState>,
}

impl ProcessingQueue {
    pub fn new(queue_id: String, items: Vec<Arc<FileQueueItem>>, max_concurrent: usize) -> Self {
        Self {
            queue_id,
            items,
            // A queue always has at least one concurrency slot
            max_concurrent: max_concurrent.max(1),
            created_at: Instant::now(),
            cancelled: AtomicBool::new(false),
            state: Mutex::new(QueueState {
                status: QueueStatus::Pending,
                started_at: None,
                completed_at: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.queue_id
    }

    pub fn items(&self) -> &[Arc<FileQueueItem>] {
        &self.items
    }

    pub fn total_files(&self) -> usize {
        self.items.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn status(&self) -> QueueStatus {
        self.state.lock().status
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Requests cancellation of this queue.
    ///
    /// Best-effort: items already dispatched to a worker run to completion;
    /// not-yet-dispatched items are skipped. Returns false when the queue is
    /// already terminal, so callers can distinguish a no-op.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return false;
        }
        self.cancelled.store(true, Ordering::SeqCst);
        if state.status == QueueStatus::Pending {
            // No active run to observe the flag; finalize here
            state.status = QueueStatus::Cancelled;
            state.completed_at = Some(Instant::now());
        }
        debug!("Cancellation requested for queue {}", self.queue_id);
        true
    }

    /// Transitions the queue into the processing state at run start.
    pub fn mark_started(&self) {
        let mut state = self.state.lock();
        state.status = QueueStatus::Processing;
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
    }

    /// Records the run's terminal status.
    pub fn finalize(&self, status: QueueStatus) {
        let mut state = self.state.lock();
        state.status = status;
        state.completed_at = Some(Instant::now());
    }

    /// Number of items with a terminal result.
    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_completed()).count()
    }

    /// Number of items that failed.
    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_failed()).count()
    }

    /// Items without a terminal result, in insertion order.
    pub fn pending_items(&self) -> Vec<Arc<FileQueueItem>> {
        self.items
            .iter()
            .filter(|i| !i.is_completed())
            .cloned()
            .collect()
    }

    /// Time since the queue reached a terminal status, if it has.
    pub fn terminal_age(&self) -> Option<Duration> {
        let state = self.state.lock();
        if state.status.is_terminal() {
            state.completed_at.map(|at| at.elapsed())
        } else {
            None
        }
    }

    /// Consistent externally visible snapshot.
    pub fn info(&self) -> QueueInfo {
        QueueInfo {
            queue_id: self.queue_id.clone(),
            status: self.status(),
            total_files: self.total_files(),
            completed_files: self.completed_count(),
            error_count: self.error_count(),
            max_concurrent: self.max_concurrent,
            age_seconds: self.created_at.elapsed().as_secs_f64(),
        }
    }
}
