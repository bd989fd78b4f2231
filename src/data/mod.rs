//! Training data and label decoding.
//!
//! - [`TrainingExample`]: a target path plus its context window
//! - [`Decoder`]: optional path -> label lookup used in diagnostics

mod decode;
mod example;

pub use decode::{describe_path, DecodeError, Decoder, MapDecoder, NoDecoder};
pub use example::{ExampleId, TrainingExample};
