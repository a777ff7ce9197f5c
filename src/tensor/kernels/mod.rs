//! Kernel implementations for tensor operations
//!
//! Plain CPU loops over flat row-major buffers. The tensor layer handles
//! shapes and batching and hands slices to these kernels.

pub mod gemm;
