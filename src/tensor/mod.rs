//! Tensor module containing tensor operations and kernels
//!
//! This module provides the fixed-rank `Tensor` type, element-wise
//! arithmetic with broadcasting, and the matrix operations the layers need.

mod core;
pub mod kernels;
pub mod ops;

pub use self::core::Tensor;
pub use ops::{matrix_product, transpose_2d};
