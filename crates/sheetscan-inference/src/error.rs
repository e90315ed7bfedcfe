//! Error types for the inference layer.

use thiserror::Error;

/// Errors that can occur while loading or running an auxiliary model.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The ONNX model could not be read or parsed.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The runtime session could not be created.
    #[error("failed to create session: {0}")]
    SessionCreate(String),

    /// An input tensor had an unexpected shape or type.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The forward pass failed.
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// An output tensor could not be converted.
    #[error("failed to extract output: {0}")]
    OutputExtraction(String),

    /// I/O error when reading a model file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
