//! Element-wise activation layers

use tracing::instrument;

use crate::error::{Error, Result, TensorError};
use crate::tensor::Tensor;

fn cached<'a>(cache: &'a Option<Tensor<2>>, layer: &'static str, grad: &Tensor<2>) -> Result<&'a Tensor<2>> {
    let cached = cache.as_ref().ok_or(Error::NoForwardPass { layer })?;
    if cached.shape() != grad.shape() {
        return Err(TensorError::shape_mismatch("activation backward", cached.shape(), grad.shape()).into());
    }
    Ok(cached)
}

/// Rectified linear unit: max(0, x)
#[derive(Debug, Clone, Default)]
pub struct Relu {
    input: Option<Tensor<2>>,
}

impl Relu {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, input), fields(shape = ?input.shape()))]
    pub fn forward(&mut self, input: &Tensor<2>) -> Result<Tensor<2>> {
        self.input = Some(input.clone());
        Ok(input.map(|x| x.max(0.0)))
    }

    /// Passes the gradient where the cached input was positive, zero elsewhere
    pub fn backward(&mut self, grad: &Tensor<2>) -> Result<Tensor<2>> {
        let input = cached(&self.input, "ReLU", grad)?;
        let data = input
            .iter()
            .zip(grad.iter())
            .map(|(&x, &g)| if x > 0.0 { g } else { 0.0 })
            .collect();
        Ok(Tensor::from_vec(*grad.shape(), data)?)
    }
}

/// Logistic sigmoid: 1 / (1 + e^-x)
#[derive(Debug, Clone, Default)]
pub struct Sigmoid {
    output: Option<Tensor<2>>,
}

impl Sigmoid {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, input), fields(shape = ?input.shape()))]
    pub fn forward(&mut self, input: &Tensor<2>) -> Result<Tensor<2>> {
        let output = input.map(|x| 1.0 / (1.0 + (-x).exp()));
        self.output = Some(output.clone());
        Ok(output)
    }

    /// g * s * (1 - s) with the cached output s
    pub fn backward(&mut self, grad: &Tensor<2>) -> Result<Tensor<2>> {
        let output = cached(&self.output, "Sigmoid", grad)?;
        let data = output
            .iter()
            .zip(grad.iter())
            .map(|(&s, &g)| g * s * (1.0 - s))
            .collect();
        Ok(Tensor::from_vec(*grad.shape(), data)?)
    }
}
