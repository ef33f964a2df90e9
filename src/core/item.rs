//! Per-file queue item state.

use std::path::Path;
use std::time::Instant;
use parking_lot::Mutex;
use tracing::warn;

use crate::core::{ConversionResult, ProcessingOptions};

/// Mutable lifecycle state of a queue item.
///
/// Written by exactly one worker at a time; the executing strategy never
/// dispatches the same item twice. The lock is held only for field access,
/// never across an await.
#[derive(Debug, Default)]
struct ItemState {
    started_at: Option<Instant>,
    completed_at: Option<Instant>,
    result: Option<ConversionResult>,
    error: Option<String>,
}

/// One file's conversion task and its state within a queue.
///
/// Identity (`file_path`, `options`, `priority`) is immutable after enqueue;
/// lifecycle state transitions pending → started → terminal exactly once and
/// is never resurrected.
#[derive(Debug)]
pub struct FileQueueItem {
    file_path: String,
    options: ProcessingOptions,
    /// Advisory metadata carried with the item; dispatch order is insertion
    /// order and does not consult this field.
    priority: i32,
    added_at: Instant,
    state: Mutex<ItemState>,
}

impl FileQueueItem {
    pub fn new(file_path: String, options: ProcessingOptions, priority: i32) -> Self {
        Self {
            file_path,
            options,
            priority,
            added_at: Instant::now(),
            state: Mutex::new(ItemState::default()),
        }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Best-effort display name (final path component).
    pub fn file_name(&self) -> &str {
        Path::new(&self.file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.file_path)
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn added_at(&self) -> Instant {
        self.added_at
    }

    /// Marks the item as picked up by a worker.
    pub fn mark_started(&self) {
        let mut state = self.state.lock();
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
    }

    /// Records the terminal outcome for this item.
    ///
    /// A second call is a logic error in the strategy; it is logged and
    /// ignored so the first outcome stands.
    pub fn complete(&self, result: ConversionResult) {
        let mut state = self.state.lock();
        if state.completed_at.is_some() {
            warn!("Item already completed, ignoring second result: {}", self.file_path);
            return;
        }
        state.completed_at = Some(Instant::now());
        if !result.success {
            state.error = result.error_message.clone();
        }
        state.result = Some(result);
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started_at.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().completed_at.is_some()
    }

    /// True when the item reached a terminal state with an error recorded.
    pub fn is_failed(&self) -> bool {
        self.state.lock().error.is_some()
    }

    /// In-flight = picked up by a worker but not yet terminal.
    pub fn is_in_flight(&self) -> bool {
        let state = self.state.lock();
        state.started_at.is_some() && state.completed_at.is_none()
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn result(&self) -> Option<ConversionResult> {
        self.state.lock().result.clone()
    }

    /// Wall-clock duration from pickup to completion, if terminal.
    pub fn processing_duration(&self) -> Option<std::time::Duration> {
        let state = self.state.lock();
        match (state.started_at, state.completed_at) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Time spent in flight so far, if started and not yet terminal.
    pub fn in_flight_duration(&self) -> Option<std::time::Duration> {
        let state = self.state.lock();
        match (state.started_at, state.completed_at) {
            (Some(start), None) => Some(start.elapsed()),
            _ => None,
        }
    }
}
