mod encoder;

pub use encoder::{encode_file, passthrough_processor};
