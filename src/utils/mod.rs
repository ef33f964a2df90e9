pub mod error;
pub mod validation;

pub use error::{ConverterError, ConverterResult, PathError, ValidationError};
pub use validation::{validate_input_path, validate_options};
