//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

use crate::{InputTensor, OutputTensor, Result};

/// A loaded ONNX model that can be run on named input tensors.
///
/// Implementations must be shareable across threads; a backend that wraps a
/// non-reentrant session is expected to serialize calls internally.
pub trait InferenceBackend: Send + Sync {
    /// Run the model and return every output in declaration order.
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    /// Input names expected by the model.
    fn input_names(&self) -> &[String];

    /// Output names produced by the model.
    fn output_names(&self) -> &[String];

    /// Name of the first model input, falling back to `"x"` (the Paddle export default).
    fn primary_input(&self) -> &str {
        self.input_names().first().map(String::as_str).unwrap_or("x")
    }
}
