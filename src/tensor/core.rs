use std::fmt;
use std::ops::{Index, IndexMut};

use rand::distributions::Uniform;
use rand::prelude::Distribution;
use rand::Rng;
use tracing::instrument;

use crate::error::TensorError;

/// Dense row-major tensor whose rank is fixed by the type
///
/// The backing buffer always holds exactly `shape.iter().product()` elements.
/// Cloning deep-copies the buffer, so two tensors never alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<const R: usize> {
    data: Vec<f32>,
    shape: [usize; R],
}

pub(crate) fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides for a contiguous buffer of the given shape
pub(crate) fn contiguous_strides<const R: usize>(shape: &[usize; R]) -> [usize; R] {
    let mut strides = [1; R];
    for i in (0..R.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

impl<const R: usize> Tensor<R> {
    /// Create a zero-filled tensor with the given shape
    #[instrument(fields(numel = element_count(&shape)))]
    pub fn new(shape: [usize; R]) -> Self {
        Tensor {
            data: vec![0.0; element_count(&shape)],
            shape,
        }
    }

    /// Create a tensor from a row-major buffer
    #[instrument(skip(data), fields(numel = data.len()))]
    pub fn from_vec(shape: [usize; R], data: Vec<f32>) -> Result<Self, TensorError> {
        let expected = element_count(&shape);
        if expected != data.len() {
            return Err(TensorError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Tensor { data, shape })
    }

    pub fn zeros(shape: [usize; R]) -> Self {
        Self::new(shape)
    }

    pub fn ones(shape: [usize; R]) -> Self {
        Self::full(shape, 1.0)
    }

    pub fn full(shape: [usize; R], value: f32) -> Self {
        Tensor {
            data: vec![value; element_count(&shape)],
            shape,
        }
    }

    /// Create a tensor with values drawn uniformly from `[low, high)`
    ///
    /// # Panics
    /// If `low >= high`.
    #[instrument(skip(rng))]
    pub fn random_uniform<G: Rng + ?Sized>(
        shape: [usize; R],
        low: f32,
        high: f32,
        rng: &mut G,
    ) -> Self {
        let uniform = Uniform::new(low, high);
        let data = (0..element_count(&shape))
            .map(|_| uniform.sample(rng))
            .collect();
        Tensor { data, shape }
    }

    pub fn shape(&self) -> &[usize; R] {
        &self.shape
    }

    /// Total number of elements
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f32> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, f32> {
        self.data.iter_mut()
    }

    /// Flat row-major offset of `index`, or `None` when any coordinate is out of range
    pub fn offset(&self, index: [usize; R]) -> Option<usize> {
        let mut offset = 0;
        for (&i, &dim) in index.iter().zip(self.shape.iter()) {
            if i >= dim {
                return None;
            }
            offset = offset * dim + i;
        }
        Some(offset)
    }

    pub fn get(&self, index: [usize; R]) -> Option<&f32> {
        self.offset(index).map(|i| &self.data[i])
    }

    pub fn get_mut(&mut self, index: [usize; R]) -> Option<&mut f32> {
        let i = self.offset(index)?;
        Some(&mut self.data[i])
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Change the dimensions, truncating the buffer or padding it with zeros
    #[instrument(skip(self), fields(old_shape = ?self.shape))]
    pub fn resize(&mut self, dims: [usize; R]) {
        self.data.resize(element_count(&dims), 0.0);
        self.shape = dims;
    }

    /// Reinterpret the buffer with a new shape of the same element count
    #[instrument(skip(self), fields(old_shape = ?self.shape))]
    pub fn reshape(&mut self, shape: [usize; R]) -> Result<(), TensorError> {
        let expected = element_count(&shape);
        if expected != self.data.len() {
            return Err(TensorError::SizeMismatch {
                expected,
                actual: self.data.len(),
            });
        }
        self.shape = shape;
        Ok(())
    }

    /// Overwrite every element from a row-major slice of the same length
    pub fn assign(&mut self, values: &[f32]) -> Result<(), TensorError> {
        if values.len() != self.data.len() {
            return Err(TensorError::SizeMismatch {
                expected: self.data.len(),
                actual: values.len(),
            });
        }
        self.data.copy_from_slice(values);
        Ok(())
    }

    /// Apply `f` to every element, producing a tensor of the same shape
    pub fn map<F: Fn(f32) -> f32>(&self, f: F) -> Tensor<R> {
        Tensor {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape,
        }
    }

    pub fn add_scalar(&self, scalar: f32) -> Tensor<R> {
        self.map(|x| x + scalar)
    }

    pub fn sub_scalar(&self, scalar: f32) -> Tensor<R> {
        self.map(|x| x - scalar)
    }

    pub fn mul_scalar(&self, scalar: f32) -> Tensor<R> {
        self.map(|x| x * scalar)
    }

    /// Divide every element by `scalar`; dividing by zero yields inf/NaN like plain f32 math
    pub fn div_scalar(&self, scalar: f32) -> Tensor<R> {
        self.map(|x| x / scalar)
    }
}

// ============================================================================
// Matrix helpers
// ============================================================================

impl Tensor<2> {
    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    /// Elements of row `i`
    ///
    /// # Panics
    /// * If `i` is not below `rows()`
    pub fn row(&self, i: usize) -> &[f32] {
        assert!(i < self.rows(), "row {} out of bounds for {} rows", i, self.rows());
        let cols = self.cols();
        &self.data[i * cols..(i + 1) * cols]
    }

    /// Copy `len` consecutive rows starting at `start` into a new tensor
    pub fn slice_rows(&self, start: usize, len: usize) -> Result<Tensor<2>, TensorError> {
        if start + len > self.rows() {
            return Err(TensorError::shape_mismatch(
                "slice_rows",
                &self.shape,
                &[start, len],
            ));
        }
        let cols = self.cols();
        Ok(Tensor {
            data: self.data[start * cols..(start + len) * cols].to_vec(),
            shape: [len, cols],
        })
    }

    /// Column-wise sum, returned as a `1 x cols` row
    #[instrument(skip(self), fields(shape = ?self.shape))]
    pub fn sum_rows(&self) -> Tensor<2> {
        let cols = self.cols();
        let mut data = vec![0.0; cols];
        for row in self.data.chunks_exact(cols.max(1)).take(self.rows()) {
            for (acc, &x) in data.iter_mut().zip(row) {
                *acc += x;
            }
        }
        Tensor {
            data,
            shape: [1, cols],
        }
    }

    /// Column index of the largest value in each row (first one wins on ties)
    pub fn argmax_rows(&self) -> Vec<usize> {
        (0..self.rows())
            .map(|i| {
                let mut best = 0;
                for (j, &x) in self.row(i).iter().enumerate() {
                    if x > self.row(i)[best] {
                        best = j;
                    }
                }
                best
            })
            .collect()
    }
}

// ============================================================================
// Indexing
// ============================================================================

impl<const R: usize> Index<[usize; R]> for Tensor<R> {
    type Output = f32;

    fn index(&self, index: [usize; R]) -> &f32 {
        match self.offset(index) {
            Some(i) => &self.data[i],
            None => panic!(
                "Index {:?} out of bounds for tensor of shape {:?}",
                index, self.shape
            ),
        }
    }
}

impl<const R: usize> IndexMut<[usize; R]> for Tensor<R> {
    fn index_mut(&mut self, index: [usize; R]) -> &mut f32 {
        match self.offset(index) {
            Some(i) => &mut self.data[i],
            None => panic!(
                "Index {:?} out of bounds for tensor of shape {:?}",
                index, self.shape
            ),
        }
    }
}

impl<'a, const R: usize> IntoIterator for &'a Tensor<R> {
    type Item = &'a f32;
    type IntoIter = std::slice::Iter<'a, f32>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

// ============================================================================
// Display
// ============================================================================

fn write_rows(f: &mut fmt::Formatter<'_>, data: &[f32], shape: &[usize]) -> fmt::Result {
    if shape.len() == 2 {
        let cols = shape[1];
        for row in data.chunks(cols.max(1)).take(shape[0]) {
            let line: Vec<String> = row.iter().map(|x| x.to_string()).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        return Ok(());
    }
    let block = element_count(&shape[1..]);
    for i in 0..shape[0] {
        writeln!(f, "{{")?;
        write_rows(f, &data[i * block..(i + 1) * block], &shape[1..])?;
        writeln!(f, "}}")?;
    }
    Ok(())
}

impl<const R: usize> fmt::Display for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if R < 2 {
            let values: Vec<String> = self.data.iter().map(|x| x.to_string()).collect();
            return write!(f, "{}", values.join(" "));
        }
        writeln!(f, "{{")?;
        write_rows(f, &self.data, &self.shape)?;
        write!(f, "}}")
    }
}


// ============================================================================
// Operator Overloads
// ============================================================================

use std::ops::{Add, Div, Mul, Sub};

/// `&a + &b` with broadcasting; shape errors surface in the `Result`
impl<const R: usize> Add for &Tensor<R> {
    type Output = Result<Tensor<R>, TensorError>;

    fn add(self, rhs: Self) -> Self::Output {
        Tensor::add(self, rhs)
    }
}

/// `&a - &b` with broadcasting
impl<const R: usize> Sub for &Tensor<R> {
    type Output = Result<Tensor<R>, TensorError>;

    fn sub(self, rhs: Self) -> Self::Output {
        Tensor::sub(self, rhs)
    }
}

/// `&a * &b`, element-wise with broadcasting
impl<const R: usize> Mul for &Tensor<R> {
    type Output = Result<Tensor<R>, TensorError>;

    fn mul(self, rhs: Self) -> Self::Output {
        Tensor::mul(self, rhs)
    }
}

impl<const R: usize> Add<f32> for &Tensor<R> {
    type Output = Tensor<R>;

    fn add(self, scalar: f32) -> Self::Output {
        self.add_scalar(scalar)
    }
}

impl<const R: usize> Sub<f32> for &Tensor<R> {
    type Output = Tensor<R>;

    fn sub(self, scalar: f32) -> Self::Output {
        self.sub_scalar(scalar)
    }
}

impl<const R: usize> Mul<f32> for &Tensor<R> {
    type Output = Tensor<R>;

    fn mul(self, scalar: f32) -> Self::Output {
        self.mul_scalar(scalar)
    }
}

impl<const R: usize> Div<f32> for &Tensor<R> {
    type Output = Tensor<R>;

    fn div(self, scalar: f32) -> Self::Output {
        self.div_scalar(scalar)
    }
}

/// `scalar + &tensor`
impl<const R: usize> Add<&Tensor<R>> for f32 {
    type Output = Tensor<R>;

    fn add(self, tensor: &Tensor<R>) -> Self::Output {
        tensor.add_scalar(self)
    }
}

/// `scalar * &tensor`
impl<const R: usize> Mul<&Tensor<R>> for f32 {
    type Output = Tensor<R>;

    fn mul(self, tensor: &Tensor<R>) -> Self::Output {
        tensor.mul_scalar(self)
    }
}
