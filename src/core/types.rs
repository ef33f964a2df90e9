//! Core types for conversion options and results.

use serde::{Deserialize, Serialize};

/// Configuration options for a single file conversion.
///
/// The engine never interprets these beyond validation — they are handed
/// verbatim to the processor supplied by the caller, which owns the actual
/// decode/transform/encode work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingOptions {
    /// Re-compression quality (1-100); `None` keeps the source encoding
    pub quality: Option<u32>,
    /// Resize settings for image dimensions
    #[serde(default)]
    pub resize: ResizeOptions,
    /// Clockwise rotation in degrees, multiples of 90
    pub rotation: Option<i32>,
    /// Mirror the image horizontally
    #[serde(rename = "flipHorizontal", default)]
    pub flip_horizontal: bool,
    /// Mirror the image vertically
    #[serde(rename = "flipVertical", default)]
    pub flip_vertical: bool,
    /// Output format override (jpeg, png, webp); `None` keeps the source format
    #[serde(rename = "outputFormat")]
    pub output_format: Option<String>,
}

/// Resize settings for image dimensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResizeOptions {
    /// Target width in pixels
    pub width: Option<u32>,
    /// Target height in pixels
    pub height: Option<u32>,
    /// Whether to maintain aspect ratio when resizing
    #[serde(rename = "maintainAspect", default)]
    pub maintain_aspect: bool,
}

/// Result of converting one file to base64.
///
/// Streamed back to the caller in completion order; consumers must match
/// results to inputs by `file_path`, not by position.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    /// Path to the source file
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// Whether the conversion succeeded
    pub success: bool,
    /// Base64-encoded output; `None` on failure
    #[serde(rename = "base64Data")]
    pub base64_data: Option<String>,
    /// Error message if the conversion failed
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
    /// Source file size in bytes
    #[serde(rename = "fileSize")]
    pub file_size: u64,
    /// Wall-clock processing time in seconds
    #[serde(rename = "processingTime")]
    pub processing_time: f64,
}

impl ConversionResult {
    /// Creates a failed result carrying an error message.
    pub fn failed(file_path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            success: false,
            base64_data: None,
            error_message: Some(error.into()),
            file_size: 0,
            processing_time: 0.0,
        }
    }
}

/// Lifecycle status of a processing queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Error,
    Cancelled,
}

impl QueueStatus {
    /// Terminal statuses allow removal and age-based cleanup.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Point-in-time snapshot of a queue's externally visible state.
#[derive(Debug, Clone, Serialize)]
pub struct QueueInfo {
    /// Opaque queue identifier
    #[serde(rename = "queueId")]
    pub queue_id: String,
    /// Queue lifecycle status
    pub status: QueueStatus,
    /// Number of files in the queue
    #[serde(rename = "totalFiles")]
    pub total_files: usize,
    /// Number of files with a terminal result
    #[serde(rename = "completedFiles")]
    pub completed_files: usize,
    /// Number of files that failed
    #[serde(rename = "errorCount")]
    pub error_count: usize,
    /// Concurrency ceiling for this queue
    #[serde(rename = "maxConcurrent")]
    pub max_concurrent: usize,
    /// Seconds since the queue was created
    #[serde(rename = "ageSeconds")]
    pub age_seconds: f64,
}
