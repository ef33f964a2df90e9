//! Derived progress snapshot types.

use serde::Serialize;

use crate::core::QueueStatus;

/// Point-in-time progress snapshot for a queue.
///
/// Recomputed from item states on every query and never mutated in place;
/// two queries without intervening processing return equal snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInfo {
    /// Total number of files in the queue
    pub total_files: usize,
    /// Number of files with a terminal result
    pub completed_files: usize,
    /// Best-effort name of an in-flight file
    pub current_file: Option<String>,
    /// Estimated seconds until the batch completes
    pub estimated_time_remaining: f64,
    /// Queue status as visible to callers
    pub status: QueueStatus,
    /// Number of failed files so far
    pub error_count: usize,
    /// Fraction of the current file believed done, in [0, 1]
    pub current_file_progress: f64,
}

impl ProgressInfo {
    /// Overall completion percentage (0-100).
    pub fn progress_percentage(&self) -> usize {
        if self.total_files > 0 {
            (self.completed_files * 100) / self.total_files
        } else {
            0
        }
    }
}
