use std::fmt;
use std::str::FromStr;

use tracing::{debug, instrument};

use crate::error::{ParseKindError, TensorError};
use crate::tensor::Tensor;

fn check_same_shape<const R: usize>(
    params: &Tensor<R>,
    grads: &Tensor<R>,
) -> Result<(), TensorError> {
    if params.shape() != grads.shape() {
        return Err(TensorError::shape_mismatch(
            "optimizer update",
            params.shape(),
            grads.shape(),
        ));
    }
    Ok(())
}

/// Stochastic Gradient Descent optimizer
#[derive(Debug, Clone, PartialEq)]
pub struct Sgd {
    pub learning_rate: f32,
}

impl Sgd {
    /// Create a new SGD optimizer with given learning rate
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }

    /// Formula: param = param - learning_rate * grad
    #[instrument(skip(self, params, grads), fields(shape = ?params.shape(), lr = self.learning_rate))]
    pub fn update<const R: usize>(
        &mut self,
        params: &mut Tensor<R>,
        grads: &Tensor<R>,
    ) -> Result<(), TensorError> {
        check_same_shape(params, grads)?;
        params
            .iter_mut()
            .zip(grads.iter())
            .for_each(|(p, g)| *p -= self.learning_rate * g);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Moments {
    shape: Vec<usize>,
    m: Vec<f32>,
    v: Vec<f32>,
}

impl Moments {
    fn zeros(shape: &[usize]) -> Self {
        let numel = shape.iter().product();
        Moments {
            shape: shape.to_vec(),
            m: vec![0.0; numel],
            v: vec![0.0; numel],
        }
    }
}

/// Adam optimizer with a single first/second moment pair
///
/// The pair is allocated for the first gradient it sees and never re-bound.
/// A later gradient with fewer elements updates the leading elements of that
/// buffer, so one instance shared across a layer's weights and biases mixes
/// their moving averages. A gradient with more elements than the buffer is a
/// `ShapeMismatch`. Give each tensor its own instance to keep the averages
/// separate.
#[derive(Debug, Clone, PartialEq)]
pub struct Adam {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    moments: Option<Moments>,
    t: u32,
}

impl Adam {
    pub const DEFAULT_BETA1: f32 = 0.9;
    pub const DEFAULT_BETA2: f32 = 0.999;
    pub const DEFAULT_EPSILON: f32 = 1e-8;

    pub fn new(learning_rate: f32) -> Self {
        Self::with_hyperparameters(
            learning_rate,
            Self::DEFAULT_BETA1,
            Self::DEFAULT_BETA2,
            Self::DEFAULT_EPSILON,
        )
    }

    pub fn with_hyperparameters(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            moments: None,
            t: 0,
        }
    }

    /// Number of updates applied so far
    pub fn timestep(&self) -> u32 {
        self.t
    }

    #[instrument(skip(self, params, grads), fields(shape = ?params.shape(), t = self.t + 1))]
    pub fn update<const R: usize>(
        &mut self,
        params: &mut Tensor<R>,
        grads: &Tensor<R>,
    ) -> Result<(), TensorError> {
        check_same_shape(params, grads)?;

        let moments = self
            .moments
            .get_or_insert_with(|| Moments::zeros(grads.shape()));
        if grads.size() > moments.m.len() {
            return Err(TensorError::shape_mismatch(
                "adam moments",
                &moments.shape,
                grads.shape(),
            ));
        }
        if moments.shape != grads.shape() {
            debug!(
                bound = ?moments.shape,
                grads = ?grads.shape(),
                "adam moments shared with a smaller gradient"
            );
        }

        self.t += 1;
        let (b1, b2) = (self.beta1, self.beta2);
        let correction1 = 1.0 - b1.powi(self.t as i32);
        let correction2 = 1.0 - b2.powi(self.t as i32);
        let lr = self.learning_rate;
        let epsilon = self.epsilon;

        for ((p, &g), (m, v)) in params
            .iter_mut()
            .zip(grads.iter())
            .zip(moments.m.iter_mut().zip(moments.v.iter_mut()))
        {
            *m = b1 * *m + (1.0 - b1) * g;
            *v = b2 * *v + (1.0 - b2) * g * g;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *p -= lr * m_hat / (v_hat.sqrt() + epsilon);
        }

        Ok(())
    }
}

/// Parameter update rule, dispatched by variant
#[derive(Debug, Clone, PartialEq)]
pub enum Optimizer {
    Sgd(Sgd),
    Adam(Adam),
}

impl Optimizer {
    /// Apply one update to `params` using `grads` of the same shape
    pub fn update<const R: usize>(
        &mut self,
        params: &mut Tensor<R>,
        grads: &Tensor<R>,
    ) -> Result<(), TensorError> {
        match self {
            Optimizer::Sgd(sgd) => sgd.update(params, grads),
            Optimizer::Adam(adam) => adam.update(params, grads),
        }
    }

    /// End-of-layer hook; both built-in rules keep no per-step state here
    pub fn step(&mut self) {
        match self {
            Optimizer::Sgd(_) | Optimizer::Adam(_) => {}
        }
    }

    pub fn learning_rate(&self) -> f32 {
        match self {
            Optimizer::Sgd(sgd) => sgd.learning_rate,
            Optimizer::Adam(adam) => adam.learning_rate,
        }
    }
}

impl From<Sgd> for Optimizer {
    fn from(sgd: Sgd) -> Self {
        Optimizer::Sgd(sgd)
    }
}

impl From<Adam> for Optimizer {
    fn from(adam: Adam) -> Self {
        Optimizer::Adam(adam)
    }
}

/// Recipe for building optimizers, as carried by the training configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerKind {
    Sgd,
    Adam { beta1: f32, beta2: f32, epsilon: f32 },
}

impl OptimizerKind {
    /// Adam with the usual 0.9 / 0.999 / 1e-8 hyperparameters
    pub fn adam() -> Self {
        OptimizerKind::Adam {
            beta1: Adam::DEFAULT_BETA1,
            beta2: Adam::DEFAULT_BETA2,
            epsilon: Adam::DEFAULT_EPSILON,
        }
    }

    pub fn build(&self, learning_rate: f32) -> Optimizer {
        match *self {
            OptimizerKind::Sgd => Sgd::new(learning_rate).into(),
            OptimizerKind::Adam {
                beta1,
                beta2,
                epsilon,
            } => Adam::with_hyperparameters(learning_rate, beta1, beta2, epsilon).into(),
        }
    }
}

impl Default for OptimizerKind {
    fn default() -> Self {
        OptimizerKind::adam()
    }
}

impl FromStr for OptimizerKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sgd" => Ok(OptimizerKind::Sgd),
            "adam" => Ok(OptimizerKind::adam()),
            _ => Err(ParseKindError {
                kind: "optimizer",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Sgd => write!(f, "sgd"),
            OptimizerKind::Adam { .. } => write!(f, "adam"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t2(shape: [usize; 2], data: &[f32]) -> Tensor<2> {
        Tensor::from_vec(shape, data.to_vec()).unwrap()
    }

    // ========================================================================
    // SGD
    // ========================================================================

    #[test]
    fn test_sgd_update() {
        let mut sgd = Sgd::new(0.1);
        let mut p = t2([1, 3], &[1.0, 2.0, 3.0]);
        let g = t2([1, 3], &[1.0, -1.0, 0.5]);
        sgd.update(&mut p, &g).unwrap();
        let expected = [0.9, 2.1, 2.95];
        for (a, b) in p.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_update_shape_mismatch() {
        let mut opt = OptimizerKind::Sgd.build(0.1);
        let mut p = Tensor::new([2, 2]);
        let g = Tensor::new([1, 2]);
        assert!(matches!(
            opt.update(&mut p, &g),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }

    // ========================================================================
    // Adam
    // ========================================================================

    #[test]
    fn test_adam_constant_gradient_moves_by_lr() {
        let lr = 0.01;
        let mut adam = Adam::new(lr);
        let mut p = t2([1, 2], &[1.0, -1.0]);
        let g = t2([1, 2], &[1.0, 1.0]);

        let mut previous = p.clone();
        for _ in 0..5 {
            adam.update(&mut p, &g).unwrap();
            for (now, before) in p.iter().zip(previous.iter()) {
                let delta = before - now;
                assert!((delta - lr).abs() < 1e-5, "delta {} != lr {}", delta, lr);
            }
            previous = p.clone();
        }
        assert_eq!(adam.timestep(), 5);
    }

    #[test]
    fn test_adam_first_step_is_scale_invariant() {
        // m_hat / sqrt(v_hat) = g / |g| on the first step
        let mut small = Adam::new(0.5);
        let mut large = Adam::new(0.5);
        let mut p1 = t2([1, 1], &[0.0]);
        let mut p2 = t2([1, 1], &[0.0]);
        small.update(&mut p1, &t2([1, 1], &[0.001])).unwrap();
        large.update(&mut p2, &t2([1, 1], &[1000.0])).unwrap();
        assert!((p1[[0, 0]] - p2[[0, 0]]).abs() < 1e-3);
        assert!((p2[[0, 0]] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_adam_smaller_gradient_reuses_leading_moments() {
        let mut adam = Adam::new(0.1);
        let mut w = Tensor::new([2, 2]);
        let mut b = Tensor::new([1, 2]);
        adam.update(&mut w, &Tensor::ones([2, 2])).unwrap();
        adam.update(&mut b, &Tensor::ones([1, 2])).unwrap();
        assert_eq!(adam.timestep(), 2);
        // The bias continues the weights' averages: m = 0.19, v = 0.001999 at t = 2,
        // so m_hat = v_hat = 1 and the step is exactly lr
        for &x in b.iter() {
            assert!((x + 0.1).abs() < 1e-4, "bias moved to {}", x);
        }
    }

    #[test]
    fn test_adam_larger_gradient_is_rejected() {
        let mut adam = Adam::new(0.1);
        let mut b = Tensor::new([1, 2]);
        let mut w = Tensor::new([2, 2]);
        adam.update(&mut b, &Tensor::ones([1, 2])).unwrap();
        let err = adam.update(&mut w, &Tensor::ones([2, 2])).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { op: "adam moments", .. }));
        assert_eq!(adam.timestep(), 1);
        assert!(w.iter().all(|&x| x == 0.0));
    }

    // ========================================================================
    // Kinds
    // ========================================================================

    #[test]
    fn test_optimizer_kind_from_str() {
        assert_eq!("sgd".parse::<OptimizerKind>().unwrap(), OptimizerKind::Sgd);
        assert_eq!("ADAM".parse::<OptimizerKind>().unwrap(), OptimizerKind::adam());
        let err = "rmsprop".parse::<OptimizerKind>().unwrap_err();
        assert_eq!(err.kind, "optimizer");
        assert_eq!(OptimizerKind::adam().to_string(), "adam");
    }

    #[test]
    fn test_build() {
        let opt = OptimizerKind::adam().build(0.01);
        assert!(matches!(opt, Optimizer::Adam(ref a) if a.beta1 == 0.9 && a.timestep() == 0));
        assert_eq!(opt.learning_rate(), 0.01);
    }
}
