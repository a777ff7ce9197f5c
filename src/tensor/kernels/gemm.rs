/// General Matrix Multiply (GEMM) kernels
///
/// Internal core GEMM operation using explicit strides
/// Computes: C += A @ B
///
/// # Arguments
/// * `a_data` - Flattened data of matrix A
/// * `m` - Number of rows in the result (and rows in A)
/// * `k` - Inner dimension (cols in A, rows in B)
/// * `a_row_stride` - Stride between consecutive rows of A
/// * `a_col_stride` - Stride between consecutive cols of A
/// * `b_data` - Flattened data of matrix B
/// * `n` - Number of cols in the result (and cols in B)
/// * `b_row_stride` - Stride between consecutive rows of B
/// * `b_col_stride` - Stride between consecutive cols of B
/// * `c_data` - Output buffer to accumulate into (shape: [m, n])
struct GemmParams<'a> {
    a_data: &'a [f32],
    m: usize,
    k: usize,
    a_row_stride: usize,
    a_col_stride: usize,
    b_data: &'a [f32],
    n: usize,
    b_row_stride: usize,
    b_col_stride: usize,
    c_data: &'a mut [f32],
}

fn gemm_core(params: GemmParams) {
    let GemmParams {
        a_data,
        m,
        k,
        a_row_stride,
        a_col_stride,
        b_data,
        n,
        b_row_stride,
        b_col_stride,
        c_data,
    } = params;

    debug_assert_eq!(c_data.len(), m * n, "Output buffer size mismatch");

    // Naive triple loop; the i-p-j order keeps the inner loop on contiguous B rows
    for i in 0..m {
        let c_row = &mut c_data[i * n..(i + 1) * n];
        for p in 0..k {
            let a_val = a_data[i * a_row_stride + p * a_col_stride];
            for (j, c) in c_row.iter_mut().enumerate() {
                *c += a_val * b_data[p * b_row_stride + j * b_col_stride];
            }
        }
    }
}

/// Accumulates the row-major product `A[m, k] @ B[k, n]` into `c`
///
/// Callers batch over 3D tensors by handing in per-batch sub-slices.
///
/// # Panics
/// * If the buffers do not match the given dimensions
pub fn matmul_into(a: &[f32], b: &[f32], c: &mut [f32], m: usize, k: usize, n: usize) {
    assert_eq!(a.len(), m * k, "Matrix A buffer does not match [{}, {}]", m, k);
    assert_eq!(b.len(), k * n, "Matrix B buffer does not match [{}, {}]", k, n);
    assert_eq!(c.len(), m * n, "Output buffer does not match [{}, {}]", m, n);

    gemm_core(GemmParams {
        a_data: a,
        m,
        k,
        a_row_stride: k,
        a_col_stride: 1,
        b_data: b,
        n,
        b_row_stride: n,
        b_col_stride: 1,
        c_data: c,
    });
}

/// Performs matrix multiplication: C = A @ B
///
/// # Arguments
/// * `a_data` - Flattened data of matrix A (row-major)
/// * `a_shape` - Shape of matrix A as [rows, cols]
/// * `b_data` - Flattened data of matrix B (row-major)
/// * `b_shape` - Shape of matrix B as [rows, cols]
///
/// # Returns
/// * Flattened result matrix C with shape [a_shape[0], b_shape[1]]
///
/// # Panics
/// * If matrices have incompatible dimensions (a_shape[1] != b_shape[0])
pub fn matmul(a_data: &[f32], a_shape: [usize; 2], b_data: &[f32], b_shape: [usize; 2]) -> Vec<f32> {
    assert_eq!(
        a_shape[1], b_shape[0],
        "Incompatible dimensions: A has {} columns but B has {} rows",
        a_shape[1], b_shape[0]
    );

    let mut result = vec![0.0; a_shape[0] * b_shape[1]];
    matmul_into(a_data, b_data, &mut result, a_shape[0], a_shape[1], b_shape[1]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul_basic() {
        // [2x3] @ [3x2] = [2x2]
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let result = matmul(&a, [2, 3], &b, [3, 2]);

        // [1*1 + 2*3 + 3*5, 1*2 + 2*4 + 3*6]   = [22, 28]
        // [4*1 + 5*3 + 6*5, 4*2 + 5*4 + 6*6]   = [49, 64]
        assert_eq!(result, vec![22.0, 28.0, 49.0, 64.0]);
    }

    #[test]
    fn test_matmul_identity() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let identity = vec![1.0, 0.0, 0.0, 1.0];

        let result = matmul(&a, [2, 2], &identity, [2, 2]);
        assert_eq!(result, a);
    }

    #[test]
    fn test_matmul_into_accumulates() {
        let a = vec![1.0, 2.0];
        let b = vec![3.0, 4.0];
        let mut c = vec![10.0];
        matmul_into(&a, &b, &mut c, 1, 2, 1);
        assert_eq!(c, vec![21.0]);
    }

    #[test]
    #[should_panic(expected = "Incompatible dimensions")]
    fn test_matmul_incompatible() {
        matmul(&[1.0; 6], [2, 3], &[1.0; 4], [2, 2]);
    }

    #[test]
    fn test_nan_propagates() {
        let a = vec![f32::NAN, 1.0];
        let b = vec![1.0, 1.0];
        assert!(matmul(&a, [1, 2], &b, [2, 1])[0].is_nan());
    }
}
