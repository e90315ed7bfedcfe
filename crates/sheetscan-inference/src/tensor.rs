//! Tensor types exchanged with inference backends.

use ndarray::{ArrayD, IxDyn};

use crate::error::InferenceError;

/// Element types the auxiliary models consume or produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
    Float32,
    Int64,
}

/// Input tensor for inference.
#[derive(Debug, Clone)]
pub enum InputTensor {
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
}

impl InputTensor {
    /// Build a Float32 tensor from a flat buffer, checking the element count.
    pub fn from_f32(data: Vec<f32>, shape: &[usize]) -> Result<Self, InferenceError> {
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(InputTensor::Float32)
            .map_err(|e| InferenceError::InvalidInput(e.to_string()))
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            InputTensor::Float32(arr) => arr.shape(),
            InputTensor::Int64(arr) => arr.shape(),
        }
    }

    pub fn dtype(&self) -> TensorType {
        match self {
            InputTensor::Float32(_) => TensorType::Float32,
            InputTensor::Int64(_) => TensorType::Int64,
        }
    }
}

/// Output tensor from inference.
#[derive(Debug, Clone)]
pub enum OutputTensor {
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
}

impl OutputTensor {
    pub fn shape(&self) -> &[usize] {
        match self {
            OutputTensor::Float32(arr) => arr.shape(),
            OutputTensor::Int64(arr) => arr.shape(),
        }
    }

    pub fn dtype(&self) -> TensorType {
        match self {
            OutputTensor::Float32(_) => TensorType::Float32,
            OutputTensor::Int64(_) => TensorType::Int64,
        }
    }

    /// Try to get the inner Float32 array.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            OutputTensor::Float32(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to get the inner Int64 array.
    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            OutputTensor::Int64(arr) => Some(arr),
            _ => None,
        }
    }

    /// Collapse the trailing axis with argmax, yielding one index per step.
    ///
    /// Int64 outputs are already token indices and are returned flattened.
    /// A Float32 output of shape `[.., steps, classes]` yields `steps` indices;
    /// leading axes beyond the first batch item are ignored.
    pub fn argmax_last_axis(&self) -> Vec<i64> {
        match self {
            OutputTensor::Int64(arr) => arr.iter().copied().collect(),
            OutputTensor::Float32(arr) => {
                let shape = arr.shape();
                let Some(&classes) = shape.last() else {
                    return Vec::new();
                };
                if classes == 0 {
                    return Vec::new();
                }
                let steps = if shape.len() >= 2 { shape[shape.len() - 2] } else { 1 };

                let flat: Vec<f32> = arr.iter().copied().collect();
                flat.chunks(classes)
                    .take(steps)
                    .map(|row| {
                        row.iter()
                            .enumerate()
                            .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| {
                                if v > best.1 { (i, v) } else { best }
                            })
                            .0 as i64
                    })
                    .collect()
            }
        }
    }
}
