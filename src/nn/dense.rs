use tracing::instrument;

use super::optim::Optimizer;
use crate::error::{Error, Result, TensorError};
use crate::tensor::{matrix_product, transpose_2d, Tensor};

/// Dense (fully-connected) layer: y = xW + b
///
/// `W` is `[in_features, out_features]` and `b` is a `[1, out_features]` row
/// broadcast over the batch.
#[derive(Debug, Clone)]
pub struct Dense {
    weights: Tensor<2>,
    biases: Tensor<2>,
    weight_grad: Tensor<2>,
    bias_grad: Tensor<2>,
    input: Option<Tensor<2>>,
}

impl Dense {
    /// Allocate parameters and let the initializers fill them
    pub fn new<W, B>(in_features: usize, out_features: usize, init_weights: W, init_biases: B) -> Self
    where
        W: FnOnce(&mut Tensor<2>),
        B: FnOnce(&mut Tensor<2>),
    {
        let mut weights = Tensor::new([in_features, out_features]);
        let mut biases = Tensor::new([1, out_features]);
        init_weights(&mut weights);
        init_biases(&mut biases);
        Self::assemble(weights, biases)
    }

    /// Build a layer from existing parameters; `biases` must be `[1, weights.cols()]`
    pub fn from_parameters(weights: Tensor<2>, biases: Tensor<2>) -> Result<Self, TensorError> {
        if biases.shape() != &[1, weights.cols()] {
            return Err(TensorError::shape_mismatch(
                "dense parameters",
                weights.shape(),
                biases.shape(),
            ));
        }
        Ok(Self::assemble(weights, biases))
    }

    fn assemble(weights: Tensor<2>, biases: Tensor<2>) -> Self {
        Dense {
            weight_grad: Tensor::zeros(*weights.shape()),
            bias_grad: Tensor::zeros(*biases.shape()),
            weights,
            biases,
            input: None,
        }
    }

    pub fn in_features(&self) -> usize {
        self.weights.rows()
    }

    pub fn out_features(&self) -> usize {
        self.weights.cols()
    }

    pub fn weights(&self) -> &Tensor<2> {
        &self.weights
    }

    pub fn biases(&self) -> &Tensor<2> {
        &self.biases
    }

    /// Gradient of the loss w.r.t. the weights from the latest backward pass
    pub fn weight_grad(&self) -> &Tensor<2> {
        &self.weight_grad
    }

    pub fn bias_grad(&self) -> &Tensor<2> {
        &self.bias_grad
    }

    /// Forward pass: y = xW + b, caching `x` for backward
    #[instrument(skip(self, input), fields(shape = ?input.shape(), out = self.out_features()))]
    pub fn forward(&mut self, input: &Tensor<2>) -> Result<Tensor<2>> {
        let output = matrix_product(input, &self.weights)?.add(&self.biases)?;
        self.input = Some(input.clone());
        Ok(output)
    }

    /// Backward pass: stores dW = x^T dZ and db = column sums of dZ, returns dZ W^T
    #[instrument(skip(self, grad), fields(shape = ?grad.shape()))]
    pub fn backward(&mut self, grad: &Tensor<2>) -> Result<Tensor<2>> {
        let input = self
            .input
            .as_ref()
            .ok_or(Error::NoForwardPass { layer: "Dense" })?;
        let expected = [input.rows(), self.out_features()];
        if grad.shape() != &expected {
            return Err(TensorError::shape_mismatch("dense backward", &expected, grad.shape()).into());
        }

        self.weight_grad = matrix_product(&transpose_2d(input)?, grad)?;
        self.bias_grad = grad.sum_rows();
        Ok(matrix_product(grad, &transpose_2d(&self.weights)?)?)
    }

    /// Apply the stored gradients to weights then biases with one optimizer
    pub fn update_params(&mut self, optimizer: &mut Optimizer) -> Result<()> {
        optimizer.update(&mut self.weights, &self.weight_grad)?;
        optimizer.update(&mut self.biases, &self.bias_grad)?;
        optimizer.step();
        Ok(())
    }

    /// Apply the stored gradients with a dedicated optimizer per tensor: `[weights, biases]`
    pub fn update_params_each(&mut self, optimizers: &mut [Optimizer]) -> Result<()> {
        match optimizers {
            [for_weights, for_biases, ..] => {
                for_weights.update(&mut self.weights, &self.weight_grad)?;
                for_biases.update(&mut self.biases, &self.bias_grad)?;
                for_weights.step();
                for_biases.step();
                Ok(())
            }
            _ => Err(Error::InvalidArgument(format!(
                "dense layer needs 2 optimizers, got {}",
                optimizers.len()
            ))),
        }
    }
}
