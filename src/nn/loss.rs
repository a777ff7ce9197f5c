use std::fmt;
use std::str::FromStr;

use tracing::instrument;

use crate::error::{ParseKindError, TensorError};
use crate::tensor::Tensor;

fn check_same_shape(predictions: &Tensor<2>, targets: &Tensor<2>) -> Result<(), TensorError> {
    if predictions.shape() != targets.shape() {
        return Err(TensorError::shape_mismatch(
            "loss",
            predictions.shape(),
            targets.shape(),
        ));
    }
    Ok(())
}

/// Mean Squared Error: mean((p - y)^2), gradient 2(p - y)/N
#[derive(Debug, Clone)]
pub struct MseLoss {
    value: f32,
    gradient: Tensor<2>,
}

impl MseLoss {
    #[instrument(skip(predictions, targets), fields(shape = ?predictions.shape()))]
    pub fn new(predictions: &Tensor<2>, targets: &Tensor<2>) -> Result<Self, TensorError> {
        check_same_shape(predictions, targets)?;
        let n = predictions.size() as f32;

        let diff = predictions.sub(targets)?;
        let value = diff.iter().map(|d| d * d).sum::<f32>() / n;
        let gradient = diff.mul_scalar(2.0 / n);

        Ok(MseLoss { value, gradient })
    }
}

/// Binary cross-entropy on probabilities
///
/// Predictions are clamped to `[EPSILON, 1 - EPSILON]` before the log and the
/// gradient, so saturated outputs never produce infinities.
#[derive(Debug, Clone)]
pub struct BceLoss {
    value: f32,
    gradient: Tensor<2>,
}

impl BceLoss {
    pub const EPSILON: f32 = 1e-7;

    #[instrument(skip(predictions, targets), fields(shape = ?predictions.shape()))]
    pub fn new(predictions: &Tensor<2>, targets: &Tensor<2>) -> Result<Self, TensorError> {
        check_same_shape(predictions, targets)?;
        let n = predictions.size() as f32;

        let mut sum = 0.0;
        let mut grad = Vec::with_capacity(predictions.size());
        for (&p, &y) in predictions.iter().zip(targets.iter()) {
            let p = p.clamp(Self::EPSILON, 1.0 - Self::EPSILON);
            sum += -y * p.ln() - (1.0 - y) * (1.0 - p).ln();
            grad.push((p - y) / (p * (1.0 - p) * n));
        }

        Ok(BceLoss {
            value: sum / n,
            gradient: Tensor::from_vec(*predictions.shape(), grad)?,
        })
    }
}

/// A computed loss: scalar value plus gradient with respect to the predictions
#[derive(Debug, Clone)]
pub enum Loss {
    Mse(MseLoss),
    Bce(BceLoss),
}

impl Loss {
    pub fn new(kind: LossKind, predictions: &Tensor<2>, targets: &Tensor<2>) -> Result<Self, TensorError> {
        Ok(match kind {
            LossKind::Mse => Loss::Mse(MseLoss::new(predictions, targets)?),
            LossKind::Bce => Loss::Bce(BceLoss::new(predictions, targets)?),
        })
    }

    pub fn value(&self) -> f32 {
        match self {
            Loss::Mse(l) => l.value,
            Loss::Bce(l) => l.value,
        }
    }

    pub fn gradient(&self) -> &Tensor<2> {
        match self {
            Loss::Mse(l) => &l.gradient,
            Loss::Bce(l) => &l.gradient,
        }
    }

    pub fn into_gradient(self) -> Tensor<2> {
        match self {
            Loss::Mse(l) => l.gradient,
            Loss::Bce(l) => l.gradient,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LossKind {
    Mse,
    #[default]
    Bce,
}

impl FromStr for LossKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mse" => Ok(LossKind::Mse),
            "bce" => Ok(LossKind::Bce),
            _ => Err(ParseKindError {
                kind: "loss",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossKind::Mse => write!(f, "mse"),
            LossKind::Bce => write!(f, "bce"),
        }
    }
}
