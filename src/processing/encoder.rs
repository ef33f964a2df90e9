//! Built-in passthrough base64 encoder.

use std::fs;
use std::time::Instant;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::core::{ConversionResult, ProcessingOptions};
use crate::strategy::ProcessorFn;
use crate::utils::ConverterResult;

/// Encodes one file's raw bytes to base64.
///
/// This is the engine's default processor: it performs no pixel transforms
/// (resize, rotate, recompress are the business of an external image
/// library) and simply re-encodes the bytes on disk. Options ride along
/// untouched.
pub fn encode_file(file_path: &str, _options: &ProcessingOptions) -> ConverterResult<ConversionResult> {
    let start = Instant::now();
    let bytes = fs::read(file_path)?;
    let file_size = bytes.len() as u64;
    let base64_data = STANDARD.encode(&bytes);
    let processing_time = start.elapsed().as_secs_f64();

    debug!(
        "Encoded {} ({} bytes) in {:.3}s",
        file_path, file_size, processing_time
    );

    Ok(ConversionResult {
        file_path: file_path.to_string(),
        success: true,
        base64_data: Some(base64_data),
        error_message: None,
        file_size,
        processing_time,
    })
}

/// The passthrough encoder as a ready-to-use processor.
pub fn passthrough_processor() -> ProcessorFn {
    std::sync::Arc::new(encode_file)
}
