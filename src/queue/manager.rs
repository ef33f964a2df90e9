//! Queue store: creation, lookup, removal, age-based cleanup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::{FileQueueItem, ProcessingOptions, ProcessingQueue, QueueInfo};
use crate::utils::{validate_input_path, validate_options, ConverterError, ConverterResult, ValidationError};

/// Limits for queue creation.
#[derive(Debug, Clone)]
pub struct QueueManagerConfig {
    /// Maximum number of files accepted in a single batch
    pub max_queue_files: usize,
}

impl Default for QueueManagerConfig {
    fn default() -> Self {
        Self {
            max_queue_files: 1000,
        }
    }
}

/// CRUD store for processing queues.
///
/// The map is the only shared resource here; its lock is held for map
/// operations only, never across an await or a blocking call. All
/// validation happens before the lock is taken.
pub struct QueueManager {
    config: QueueManagerConfig,
    queues: RwLock<HashMap<String, Arc<ProcessingQueue>>>,
}

impl QueueManager {
    pub fn new(config: QueueManagerConfig) -> Self {
        Self {
            config,
            queues: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a queue from a list of file paths.
    ///
    /// Validation is eager and all-or-nothing: an empty list, an oversized
    /// batch, or any nonexistent path rejects the whole request before a
    /// single item is created.
    pub fn create_queue(
        &self,
        files: Vec<String>,
        options: ProcessingOptions,
        priority: i32,
        max_concurrent: usize,
    ) -> ConverterResult<String> {
        if files.is_empty() {
            return Err(ValidationError::EmptyFileList.into());
        }

        if files.len() > self.config.max_queue_files {
            return Err(ConverterError::QueueFull {
                submitted: files.len(),
                limit: self.config.max_queue_files,
            });
        }

        validate_options(&options)?;
        for path in &files {
            validate_input_path(path)?;
        }

        let queue_id = Uuid::new_v4().to_string();
        let items = files
            .into_iter()
            .map(|path| Arc::new(FileQueueItem::new(path, options.clone(), priority)))
            .collect::<Vec<_>>();
        let queue = Arc::new(ProcessingQueue::new(queue_id.clone(), items, max_concurrent));

        info!(
            "Created queue {} with {} files (max_concurrent: {})",
            queue_id,
            queue.total_files(),
            queue.max_concurrent()
        );

        self.queues.write().insert(queue_id.clone(), queue);
        Ok(queue_id)
    }

    pub fn get_queue(&self, queue_id: &str) -> Option<Arc<ProcessingQueue>> {
        self.queues.read().get(queue_id).cloned()
    }

    pub fn get_queue_info(&self, queue_id: &str) -> Option<QueueInfo> {
        self.get_queue(queue_id).map(|q| q.info())
    }

    pub fn get_all_queues(&self) -> Vec<QueueInfo> {
        self.queues.read().values().map(|q| q.info()).collect()
    }

    /// Removes a queue from the store.
    ///
    /// Only terminal queues can be removed; an active queue must finish or
    /// be cancelled first.
    pub fn remove_queue(&self, queue_id: &str) -> ConverterResult<()> {
        let queue = self
            .get_queue(queue_id)
            .ok_or_else(|| ConverterError::not_found(queue_id))?;

        if !queue.status().is_terminal() {
            return Err(ConverterError::invalid_state(format!(
                "Queue {} is {} and cannot be removed",
                queue_id,
                queue.status()
            )));
        }

        self.queues.write().remove(queue_id);
        debug!("Removed queue {}", queue_id);
        Ok(())
    }

    /// Removes terminal queues whose completion is older than `max_age`.
    ///
    /// Returns the number of queues removed.
    pub fn cleanup_old_queues(&self, max_age: Duration) -> usize {
        let expired: Vec<String> = self
            .queues
            .read()
            .values()
            .filter(|q| q.terminal_age().is_some_and(|age| age >= max_age))
            .map(|q| q.id().to_string())
            .collect();

        if expired.is_empty() {
            return 0;
        }

        let mut queues = self.queues.write();
        let mut removed = 0;
        for id in expired {
            if queues.remove(&id).is_some() {
                removed += 1;
            }
        }
        info!("Cleaned up {} old queue(s)", removed);
        removed
    }

    pub fn queue_count(&self) -> usize {
        self.queues.read().len()
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new(QueueManagerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::QueueStatus;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_files(count: usize) -> Vec<NamedTempFile> {
        (0..count)
            .map(|i| {
                let mut f = NamedTempFile::new().unwrap();
                writeln!(f, "image payload {}", i).unwrap();
                f
            })
            .collect()
    }

    fn paths(files: &[NamedTempFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.path().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn create_queue_reports_all_files() {
        let manager = QueueManager::default();
        let files = temp_files(3);
        let id = manager
            .create_queue(paths(&files), ProcessingOptions::default(), 0, 2)
            .unwrap();

        let info = manager.get_queue_info(&id).unwrap();
        assert_eq!(info.total_files, 3);
        assert_eq!(info.completed_files, 0);
        assert_eq!(info.status, QueueStatus::Pending);
    }

    #[test]
    fn empty_file_list_is_rejected() {
        let manager = QueueManager::default();
        let err = manager
            .create_queue(Vec::new(), ProcessingOptions::default(), 0, 2)
            .unwrap_err();
        assert!(matches!(err, ConverterError::Validation(_)));
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let manager = QueueManager::new(QueueManagerConfig { max_queue_files: 2 });
        let files = temp_files(3);
        let err = manager
            .create_queue(paths(&files), ProcessingOptions::default(), 0, 2)
            .unwrap_err();
        assert!(matches!(err, ConverterError::QueueFull { submitted: 3, limit: 2 }));
    }

    #[test]
    fn nonexistent_path_rejects_whole_batch() {
        let manager = QueueManager::default();
        let files = temp_files(2);
        let mut all = paths(&files);
        all.push("/definitely/not/here.png".to_string());

        assert!(manager
            .create_queue(all, ProcessingOptions::default(), 0, 2)
            .is_err());
        // All-or-nothing: nothing was created
        assert_eq!(manager.queue_count(), 0);
    }

    #[test]
    fn remove_rejects_active_queue() {
        let manager = QueueManager::default();
        let files = temp_files(1);
        let id = manager
            .create_queue(paths(&files), ProcessingOptions::default(), 0, 1)
            .unwrap();

        let queue = manager.get_queue(&id).unwrap();
        queue.mark_started();
        assert!(manager.remove_queue(&id).is_err());

        queue.finalize(QueueStatus::Completed);
        assert!(manager.remove_queue(&id).is_ok());
        assert_eq!(manager.queue_count(), 0);
    }

    #[test]
    fn cleanup_honors_age_threshold() {
        let manager = QueueManager::default();
        let files = temp_files(1);
        let id = manager
            .create_queue(paths(&files), ProcessingOptions::default(), 0, 1)
            .unwrap();

        let queue = manager.get_queue(&id).unwrap();
        queue.mark_started();
        queue.finalize(QueueStatus::Completed);

        // A day-old threshold keeps a queue completed moments ago
        assert_eq!(manager.cleanup_old_queues(Duration::from_secs(24 * 3600)), 0);
        assert_eq!(manager.queue_count(), 1);

        // A zero threshold removes it
        assert_eq!(manager.cleanup_old_queues(Duration::ZERO), 1);
        assert_eq!(manager.queue_count(), 0);
    }

    #[test]
    fn cleanup_skips_active_queues() {
        let manager = QueueManager::default();
        let files = temp_files(1);
        let id = manager
            .create_queue(paths(&files), ProcessingOptions::default(), 0, 1)
            .unwrap();
        manager.get_queue(&id).unwrap().mark_started();

        assert_eq!(manager.cleanup_old_queues(Duration::ZERO), 0);
        assert_eq!(manager.queue_count(), 1);
    }
}
