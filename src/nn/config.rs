//! Training configuration

use std::fmt;
use std::str::FromStr;

use super::loss::LossKind;
use super::optim::OptimizerKind;
use crate::error::ParseKindError;

/// Environment variable that overrides the default optimizer schedule
pub const SCHEDULE_ENV: &str = "FFNN_SCHEDULE";

/// How optimizer state is scoped during training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizerSchedule {
    /// A fresh optimizer per minibatch, shared by every layer
    #[default]
    PerBatch,
    /// One optimizer per trainable tensor, kept for the whole `train` call
    Persistent,
}

impl FromStr for OptimizerSchedule {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "per-batch" | "batch" => Ok(OptimizerSchedule::PerBatch),
            "persistent" => Ok(OptimizerSchedule::Persistent),
            _ => Err(ParseKindError {
                kind: "schedule",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OptimizerSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerSchedule::PerBatch => write!(f, "per-batch"),
            OptimizerSchedule::Persistent => write!(f, "persistent"),
        }
    }
}

/// Hyperparameters for [`NeuralNetwork::train`](super::NeuralNetwork::train)
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub loss: LossKind,
    pub optimizer: OptimizerKind,
    pub schedule: OptimizerSchedule,
}

impl Default for TrainConfig {
    fn default() -> Self {
        // Check environment variable for schedule override
        let schedule = std::env::var(SCHEDULE_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            epochs: 100,
            batch_size: 64,
            learning_rate: 0.01,
            loss: LossKind::Bce,
            optimizer: OptimizerKind::adam(),
            schedule,
        }
    }
}

impl TrainConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_loss(mut self, loss: LossKind) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_schedule(mut self, schedule: OptimizerSchedule) -> Self {
        self.schedule = schedule;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_from_str() {
        assert_eq!("per-batch".parse(), Ok(OptimizerSchedule::PerBatch));
        assert_eq!("PER_BATCH".parse(), Ok(OptimizerSchedule::PerBatch));
        assert_eq!("persistent".parse(), Ok(OptimizerSchedule::Persistent));
        assert!("forever".parse::<OptimizerSchedule>().is_err());
        assert_eq!(OptimizerSchedule::Persistent.to_string(), "persistent");
    }

    #[test]
    fn test_builders() {
        let config = TrainConfig::default()
            .with_epochs(3)
            .with_batch_size(8)
            .with_learning_rate(0.5)
            .with_loss(LossKind::Mse)
            .with_optimizer(OptimizerKind::Sgd)
            .with_schedule(OptimizerSchedule::Persistent);
        assert_eq!(config.epochs, 3);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.learning_rate, 0.5);
        assert_eq!(config.loss, LossKind::Mse);
        assert_eq!(config.optimizer, OptimizerKind::Sgd);
        assert_eq!(config.schedule, OptimizerSchedule::Persistent);
    }
}
