use super::activation::{Relu, Sigmoid};
use super::dense::Dense;
use super::optim::Optimizer;
use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// One stage of a sequential network
#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    Relu(Relu),
    Sigmoid(Sigmoid),
}

impl Layer {
    pub fn forward(&mut self, input: &Tensor<2>) -> Result<Tensor<2>> {
        match self {
            Layer::Dense(l) => l.forward(input),
            Layer::Relu(l) => l.forward(input),
            Layer::Sigmoid(l) => l.forward(input),
        }
    }

    /// Propagate `grad` back through the layer; must follow a forward call
    pub fn backward(&mut self, grad: &Tensor<2>) -> Result<Tensor<2>> {
        match self {
            Layer::Dense(l) => l.backward(grad),
            Layer::Relu(l) => l.backward(grad),
            Layer::Sigmoid(l) => l.backward(grad),
        }
    }

    pub fn update_params(&mut self, optimizer: &mut Optimizer) -> Result<()> {
        match self {
            Layer::Dense(l) => l.update_params(optimizer),
            Layer::Relu(_) | Layer::Sigmoid(_) => Ok(()),
        }
    }

    /// Update with one optimizer per trainable tensor, see [`Layer::param_count`]
    pub fn update_params_each(&mut self, optimizers: &mut [Optimizer]) -> Result<()> {
        match self {
            Layer::Dense(l) => l.update_params_each(optimizers),
            Layer::Relu(_) | Layer::Sigmoid(_) => {
                if optimizers.is_empty() {
                    Ok(())
                } else {
                    Err(Error::InvalidArgument(format!(
                        "{} has no parameters but was given {} optimizers",
                        self.name(),
                        optimizers.len()
                    )))
                }
            }
        }
    }

    /// Number of trainable tensors
    pub fn param_count(&self) -> usize {
        match self {
            Layer::Dense(_) => 2,
            Layer::Relu(_) | Layer::Sigmoid(_) => 0,
        }
    }

    /// Tag used in logs and model files
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Dense(_) => "Dense",
            Layer::Relu(_) => "ReLU",
            Layer::Sigmoid(_) => "Sigmoid",
        }
    }

    pub fn as_dense(&self) -> Option<&Dense> {
        match self {
            Layer::Dense(l) => Some(l),
            _ => None,
        }
    }
}

impl From<Dense> for Layer {
    fn from(layer: Dense) -> Self {
        Layer::Dense(layer)
    }
}

impl From<Relu> for Layer {
    fn from(layer: Relu) -> Self {
        Layer::Relu(layer)
    }
}

impl From<Sigmoid> for Layer {
    fn from(layer: Sigmoid) -> Self {
        Layer::Sigmoid(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::init;
    use crate::nn::optim::OptimizerKind;

    #[test]
    fn test_dispatch_and_names() {
        let mut layers: Vec<Layer> = vec![
            Dense::new(2, 3, init::constant(1.0), init::zeros()).into(),
            Relu::new().into(),
            Sigmoid::new().into(),
        ];
        let names: Vec<_> = layers.iter().map(Layer::name).collect();
        assert_eq!(names, vec!["Dense", "ReLU", "Sigmoid"]);
        assert_eq!(layers.iter().map(Layer::param_count).sum::<usize>(), 2);

        let mut x = Tensor::ones([1, 2]);
        for layer in layers.iter_mut() {
            x = layer.forward(&x).unwrap();
        }
        assert_eq!(x.shape(), &[1, 3]);
        let expected = 1.0 / (1.0 + (-2.0f32).exp());
        assert!(x.iter().all(|&v| (v - expected).abs() < 1e-6));
    }

    #[test]
    fn test_activation_update_is_noop() {
        let mut relu: Layer = Relu::new().into();
        let mut opt = OptimizerKind::Sgd.build(1.0);
        relu.update_params(&mut opt).unwrap();
        relu.update_params_each(&mut []).unwrap();
        assert!(relu.update_params_each(&mut [opt]).is_err());
        assert!(relu.as_dense().is_none());
    }
}
