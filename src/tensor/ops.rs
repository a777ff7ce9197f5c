//! Shape-aware tensor operations
//!
//! Element-wise arithmetic with NumPy-style broadcasting, axis transpose and
//! the batched matrix product used by the dense layers.

use tracing::instrument;

use super::core::{contiguous_strides, element_count};
use super::kernels::gemm;
use super::Tensor;
use crate::error::TensorError;

/// Result shape of broadcasting `left` against `right`
///
/// Each axis must either agree or have extent 1 on one side. Only rank 2 and
/// rank 3 tensors broadcast.
pub fn broadcast_shape<const R: usize>(
    op: &'static str,
    left: &[usize; R],
    right: &[usize; R],
) -> Result<[usize; R], TensorError> {
    if R != 2 && R != 3 {
        return Err(TensorError::UnsupportedRank { op, rank: R });
    }
    let mut out = [0; R];
    for axis in 0..R {
        let (l, r) = (left[axis], right[axis]);
        out[axis] = if l == r || r == 1 {
            l
        } else if l == 1 {
            r
        } else {
            return Err(TensorError::shape_mismatch(op, left, right));
        };
    }
    Ok(out)
}

/// Strides that read `shape` as if it had `out` extents, repeating size-1 axes
fn broadcast_strides<const R: usize>(shape: &[usize; R], out: &[usize; R]) -> [usize; R] {
    let mut strides = contiguous_strides(shape);
    for axis in 0..R {
        if shape[axis] == 1 && out[axis] != 1 {
            strides[axis] = 0;
        }
    }
    strides
}

fn zip_broadcast<const R: usize, F>(
    op: &'static str,
    left: &Tensor<R>,
    right: &Tensor<R>,
    f: F,
) -> Result<Tensor<R>, TensorError>
where
    F: Fn(f32, f32) -> f32,
{
    let out_shape = broadcast_shape(op, left.shape(), right.shape())?;

    // Same shape: no index bookkeeping needed
    if left.shape() == right.shape() {
        let data = left
            .iter()
            .zip(right.iter())
            .map(|(&a, &b)| f(a, b))
            .collect();
        return Tensor::from_vec(out_shape, data);
    }

    let l_strides = broadcast_strides(left.shape(), &out_shape);
    let r_strides = broadcast_strides(right.shape(), &out_shape);
    let numel = element_count(&out_shape);
    let mut data = Vec::with_capacity(numel);
    let mut index = [0usize; R];

    for _ in 0..numel {
        let mut l_off = 0;
        let mut r_off = 0;
        for axis in 0..R {
            l_off += index[axis] * l_strides[axis];
            r_off += index[axis] * r_strides[axis];
        }
        data.push(f(left.data()[l_off], right.data()[r_off]));

        // Advance the row-major odometer
        for axis in (0..R).rev() {
            index[axis] += 1;
            if index[axis] < out_shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }

    Tensor::from_vec(out_shape, data)
}

impl<const R: usize> Tensor<R> {
    /// Element-wise sum with broadcasting
    #[instrument(skip(self, other), fields(lhs = ?self.shape(), rhs = ?other.shape()))]
    pub fn add(&self, other: &Tensor<R>) -> Result<Tensor<R>, TensorError> {
        zip_broadcast("add", self, other, |a, b| a + b)
    }

    /// Element-wise difference with broadcasting
    #[instrument(skip(self, other), fields(lhs = ?self.shape(), rhs = ?other.shape()))]
    pub fn sub(&self, other: &Tensor<R>) -> Result<Tensor<R>, TensorError> {
        zip_broadcast("sub", self, other, |a, b| a - b)
    }

    /// Element-wise (Hadamard) product with broadcasting
    #[instrument(skip(self, other), fields(lhs = ?self.shape(), rhs = ?other.shape()))]
    pub fn mul(&self, other: &Tensor<R>) -> Result<Tensor<R>, TensorError> {
        zip_broadcast("mul", self, other, |a, b| a * b)
    }
}

/// Swap the last two axes
///
/// Leading axes are kept in place, so a `[B, M, N]` tensor becomes `[B, N, M]`.
#[instrument(skip(input), fields(shape = ?input.shape()))]
pub fn transpose_2d<const R: usize>(input: &Tensor<R>) -> Result<Tensor<R>, TensorError> {
    if R < 2 {
        return Err(TensorError::UnsupportedRank {
            op: "transpose_2d",
            rank: R,
        });
    }
    let rows = input.shape()[R - 2];
    let cols = input.shape()[R - 1];
    let mut out_shape = *input.shape();
    out_shape.swap(R - 2, R - 1);

    let plane = rows * cols;
    let batches = element_count(&input.shape()[..R - 2]);
    let src = input.data();
    let mut data = vec![0.0; src.len()];

    for b in 0..batches {
        let base = b * plane;
        for i in 0..rows {
            for j in 0..cols {
                data[base + j * rows + i] = src[base + i * cols + j];
            }
        }
    }

    Tensor::from_vec(out_shape, data)
}

/// Batched matrix product over the last two axes
///
/// Leading axes are batch dimensions; an axis of extent 1 on one side is
/// repeated against the other side. `[B, M, K] x [1, K, N]` gives `[B, M, N]`.
#[instrument(skip(left, right), fields(lhs = ?left.shape(), rhs = ?right.shape()))]
pub fn matrix_product<const R: usize>(
    left: &Tensor<R>,
    right: &Tensor<R>,
) -> Result<Tensor<R>, TensorError> {
    if R < 2 {
        return Err(TensorError::UnsupportedRank {
            op: "matrix_product",
            rank: R,
        });
    }
    let (ls, rs) = (left.shape(), right.shape());
    let (m, k) = (ls[R - 2], ls[R - 1]);
    let (k2, n) = (rs[R - 2], rs[R - 1]);
    if k != k2 {
        return Err(TensorError::shape_mismatch("matrix_product", ls, rs));
    }

    let mut out_shape = [0; R];
    for axis in 0..R - 2 {
        let (l, r) = (ls[axis], rs[axis]);
        out_shape[axis] = if l == r || r == 1 {
            l
        } else if l == 1 {
            r
        } else {
            return Err(TensorError::shape_mismatch("matrix_product", ls, rs));
        };
    }
    out_shape[R - 2] = m;
    out_shape[R - 1] = n;

    let batch_dims = &out_shape[..R - 2];
    let batches = element_count(batch_dims);
    let mut data = vec![0.0; batches * m * n];

    for batch in 0..batches {
        // Decompose the flat batch index and map it onto each operand
        let mut rem = batch;
        let mut l_batch = 0;
        let mut r_batch = 0;
        let mut l_scale = 1;
        let mut r_scale = 1;
        for axis in (0..R - 2).rev() {
            let coord = rem % out_shape[axis];
            rem /= out_shape[axis];
            if ls[axis] != 1 {
                l_batch += coord * l_scale;
            }
            if rs[axis] != 1 {
                r_batch += coord * r_scale;
            }
            l_scale *= ls[axis];
            r_scale *= rs[axis];
        }

        gemm::matmul_into(
            &left.data()[l_batch * m * k..(l_batch + 1) * m * k],
            &right.data()[r_batch * k * n..(r_batch + 1) * k * n],
            &mut data[batch * m * n..(batch + 1) * m * n],
            m,
            k,
            n,
        );
    }

    Tensor::from_vec(out_shape, data)
}
