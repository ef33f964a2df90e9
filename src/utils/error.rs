//! Error types for the conversion engine.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.

use std::io;
use std::path::PathBuf;
use serde::Serialize;
use thiserror::Error;

/// Validation errors for enqueue requests.
#[derive(Error, Debug, Serialize)]
pub enum ValidationError {
    /// Path-related validation error
    #[error("Path error: {0}")]
    Path(#[from] PathError),
    /// The submitted file list was empty
    #[error("File list is empty")]
    EmptyFileList,
    /// Invalid processing options
    #[error("Options error: {0}")]
    Options(String),
}

/// File path errors.
#[derive(Error, Debug, Serialize)]
pub enum PathError {
    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    /// Path exists but is not a file
    #[error("Not a file: {0}")]
    NotFile(PathBuf),
    /// IO error accessing the path
    #[error("IO error: {0}")]
    IO(String),
}

/// Main error type for the conversion engine.
///
/// Batch-level problems surface through this type before any work starts;
/// per-item failures never do — they become failed conversion results
/// instead and the batch continues.
#[derive(Error, Debug, Serialize)]
pub enum ConverterError {
    /// Enqueue request validation failed
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The batch exceeds the per-queue file limit
    #[error("Queue full: {submitted} files exceeds the limit of {limit}")]
    QueueFull { submitted: usize, limit: usize },

    /// No queue exists for the given id
    #[error("Queue not found: {0}")]
    NotFound(String),

    /// The queue is not in a state that allows the operation
    #[error("Invalid queue state: {0}")]
    InvalidState(String),

    /// Worker pool failure (pool unavailable, submission rejected)
    #[error("Worker error: {0}")]
    Worker(String),

    /// Conversion processing failed
    #[error("Processing error: {0}")]
    Processing(String),

    /// File IO error
    #[error("IO error: {0}")]
    IO(String),
}

/// Convenience result type for engine operations.
pub type ConverterResult<T> = Result<T, ConverterError>;

// Helper methods for error creation
impl ConverterError {
    pub fn worker<T: Into<String>>(msg: T) -> Self {
        Self::Worker(msg.into())
    }

    pub fn processing<T: Into<String>>(msg: T) -> Self {
        Self::Processing(msg.into())
    }

    pub fn invalid_state<T: Into<String>>(msg: T) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found<T: Into<String>>(queue_id: T) -> Self {
        Self::NotFound(queue_id.into())
    }
}

// Helper methods for validation error creation
impl ValidationError {
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::Path(PathError::NotFound(path.into()))
    }

    pub fn not_a_file(path: impl Into<PathBuf>) -> Self {
        Self::Path(PathError::NotFile(path.into()))
    }

    pub fn options(msg: impl Into<String>) -> Self {
        Self::Options(msg.into())
    }
}

// Convert std::io::Error to ConverterError
impl From<io::Error> for ConverterError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

// Convert io::Error to PathError
impl From<io::Error> for PathError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

// Convert PathError to ConverterError
impl From<PathError> for ConverterError {
    fn from(err: PathError) -> Self {
        Self::Validation(ValidationError::Path(err))
    }
}

// Pool shutdown surfaces as a worker error
impl From<tokio::sync::AcquireError> for ConverterError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        ConverterError::Worker(format!("Failed to acquire worker: {}", err))
    }
}
