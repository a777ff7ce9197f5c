//! Layers, losses, optimizers and the sequential network driver

pub mod activation;
pub mod config;
pub mod dense;
pub mod init;
pub mod layer;
pub mod loss;
pub mod network;
pub mod optim;
mod serialize;

pub use activation::{Relu, Sigmoid};
pub use config::{OptimizerSchedule, TrainConfig};
pub use dense::Dense;
pub use layer::Layer;
pub use loss::{BceLoss, Loss, LossKind, MseLoss};
pub use network::{NeuralNetwork, TrainReport};
pub use optim::{Adam, Optimizer, OptimizerKind, Sgd};
