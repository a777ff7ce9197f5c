//! A small feed-forward neural network library
//!
//! Fixed-rank `f32` tensors with broadcasting arithmetic, dense and activation
//! layers, MSE/BCE losses, SGD/Adam optimizers, a sequential training driver
//! with plain-text model files, and a loader for CSV-encoded digit images.

pub mod data;
pub mod error;
pub mod nn;
pub mod tensor;

// Re-export commonly used types for convenience
pub use error::{DataError, Error, ModelError, Result, TensorError};
pub use nn::*;
pub use tensor::{matrix_product, transpose_2d, Tensor};
