//! ONNX inference abstraction layer for sheetscan.
//!
//! The OCR itself is handled by the OCR backend in `sheetscan-core`; this crate
//! only runs the auxiliary models around it (text angle classification and
//! table structure recognition). Native builds use `ort` with the XNNPACK
//! execution provider.

mod backend;
mod error;
mod tensor;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use tensor::{InputTensor, OutputTensor, TensorType};

#[cfg(feature = "native")]
pub use backend::ort::OrtBackend;

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
