use std::path::Path;
use crate::core::ProcessingOptions;
use crate::utils::{ConverterResult, ValidationError};

/// Validates a single input file path.
///
/// The path must exist and point to a regular file. Called eagerly for every
/// file in a batch before any queue item is created, so a bad path rejects
/// the whole batch up front.
pub fn validate_input_path(path: &str) -> ConverterResult<()> {
    let path = Path::new(path);

    if !path.exists() {
        return Err(ValidationError::path_not_found(path).into());
    }

    if !path.is_file() {
        return Err(ValidationError::not_a_file(path).into());
    }

    Ok(())
}

/// Validates processing options.
pub fn validate_options(options: &ProcessingOptions) -> ConverterResult<()> {
    if let Some(quality) = options.quality {
        if quality == 0 || quality > 100 {
            return Err(ValidationError::options(
                format!("Invalid quality value: {}. Must be between 1 and 100", quality)
            ).into());
        }
    }

    if let Some(width) = options.resize.width {
        if width == 0 {
            return Err(ValidationError::options("Width cannot be 0").into());
        }
    }

    if let Some(height) = options.resize.height {
        if height == 0 {
            return Err(ValidationError::options("Height cannot be 0").into());
        }
    }

    if let Some(rotation) = options.rotation {
        if rotation % 90 != 0 {
            return Err(ValidationError::options(
                format!("Invalid rotation: {}. Must be a multiple of 90 degrees", rotation)
            ).into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rejects_missing_path() {
        let result = validate_input_path("/nonexistent/image.png");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate_input_path(dir.path().to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn accepts_regular_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"fake image bytes").unwrap();
        assert!(validate_input_path(file.path().to_str().unwrap()).is_ok());
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let mut options = ProcessingOptions::default();
        options.quality = Some(0);
        assert!(validate_options(&options).is_err());
        options.quality = Some(101);
        assert!(validate_options(&options).is_err());
        options.quality = Some(85);
        assert!(validate_options(&options).is_ok());
    }

    #[test]
    fn rejects_non_right_angle_rotation() {
        let mut options = ProcessingOptions::default();
        options.rotation = Some(45);
        assert!(validate_options(&options).is_err());
        options.rotation = Some(270);
        assert!(validate_options(&options).is_ok());
    }
}
