//! Progress snapshot derivation.

use std::sync::Arc;
use std::time::Duration;

use crate::core::{ProcessingQueue, ProgressInfo, QueueStatus};
use crate::queue::QueueManager;

/// Derives point-in-time progress snapshots from a queue's item states.
///
/// Stateless apart from the manager reference: every call recomputes the
/// snapshot from scratch, so two queries without intervening processing
/// return equal values.
pub struct ProgressMonitor {
    manager: Arc<QueueManager>,
}

impl ProgressMonitor {
    pub fn new(manager: Arc<QueueManager>) -> Self {
        Self { manager }
    }

    /// Returns the current progress for a queue, or `None` if the id is
    /// unknown.
    pub fn get_progress(&self, queue_id: &str) -> Option<ProgressInfo> {
        let queue = self.manager.get_queue(queue_id)?;
        Some(Self::snapshot(&queue))
    }

    /// Computes a snapshot directly from a queue.
    pub fn snapshot(queue: &ProcessingQueue) -> ProgressInfo {
        let total_files = queue.total_files();
        let completed_files = queue.completed_count();
        let error_count = queue.error_count();

        // First item picked up but not yet terminal, best effort
        let current = queue
            .items()
            .iter()
            .find(|item| item.is_in_flight());
        let current_file = current.map(|item| item.file_name().to_string());

        let average_per_item = Self::average_item_duration(queue);
        let pending = total_files - completed_files;
        let estimated_time_remaining = if pending == 0 || average_per_item == 0.0 {
            // Coarse estimator: no signal until the first item finishes
            0.0
        } else {
            let slots = queue.max_concurrent().min(pending) as f64;
            (pending as f64 * average_per_item) / slots
        };

        let current_file_progress = match (current, average_per_item) {
            (Some(item), avg) if avg > 0.0 => item
                .in_flight_duration()
                .map(|d| (d.as_secs_f64() / avg).min(0.99))
                .unwrap_or(0.0),
            _ => 0.0,
        };

        // Tolerate the race between the last item finishing and the queue's
        // own finalization
        let mut status = queue.status();
        if status == QueueStatus::Processing && completed_files == total_files {
            status = QueueStatus::Completed;
        }

        ProgressInfo {
            total_files,
            completed_files,
            current_file,
            estimated_time_remaining,
            status,
            error_count,
            current_file_progress,
        }
    }

    /// Mean processing duration over completed items, in seconds.
    fn average_item_duration(queue: &ProcessingQueue) -> f64 {
        let durations: Vec<Duration> = queue
            .items()
            .iter()
            .filter_map(|item| item.processing_duration())
            .collect();
        if durations.is_empty() {
            return 0.0;
        }
        let total: f64 = durations.iter().map(|d| d.as_secs_f64()).sum();
        total / durations.len() as f64
    }
}
