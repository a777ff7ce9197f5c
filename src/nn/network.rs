use tracing::{debug, info, instrument};

use super::config::{OptimizerSchedule, TrainConfig};
use super::layer::Layer;
use super::loss::Loss;
use super::optim::Optimizer;
use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// Loss history produced by [`NeuralNetwork::train`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    /// Loss of every minibatch, in training order
    pub batch_losses: Vec<f32>,
    /// Mean minibatch loss of each epoch
    pub epoch_losses: Vec<f32>,
}

impl TrainReport {
    pub fn final_loss(&self) -> Option<f32> {
        self.epoch_losses.last().copied()
    }
}

/// A sequential stack of layers evaluated in insertion order
#[derive(Debug, Clone, Default)]
pub struct NeuralNetwork {
    pub(super) layers: Vec<Layer>,
}

impl NeuralNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_layer(&mut self, layer: impl Into<Layer>) {
        self.layers.push(layer.into());
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    fn forward(&mut self, input: &Tensor<2>) -> Result<Tensor<2>> {
        let mut output = input.clone();
        for layer in self.layers.iter_mut() {
            output = layer.forward(&output)?;
        }
        Ok(output)
    }

    /// Minibatch gradient descent over `x` / `y` in dataset order
    ///
    /// Batches are contiguous row ranges; the last one may be short.
    #[instrument(skip(self, x, y, config), fields(samples = x.rows(), layers = self.layers.len()))]
    pub fn train(&mut self, x: &Tensor<2>, y: &Tensor<2>, config: &TrainConfig) -> Result<TrainReport> {
        if x.rows() != y.rows() {
            return Err(Error::InvalidArgument(format!(
                "inputs have {} rows but targets have {}",
                x.rows(),
                y.rows()
            )));
        }
        if config.batch_size == 0 {
            return Err(Error::InvalidArgument("batch size must be positive".to_string()));
        }
        if x.rows() == 0 {
            return Err(Error::InvalidArgument("training set is empty".to_string()));
        }

        let total = x.rows();
        let lr = config.learning_rate;

        // Persistent schedule: one optimizer per trainable tensor, alive for the whole call
        let mut persistent: Vec<Vec<Optimizer>> = match config.schedule {
            OptimizerSchedule::Persistent => self
                .layers
                .iter()
                .map(|layer| (0..layer.param_count()).map(|_| config.optimizer.build(lr)).collect())
                .collect(),
            OptimizerSchedule::PerBatch => Vec::new(),
        };

        let mut report = TrainReport::default();
        for epoch in 0..config.epochs {
            let mut epoch_total = 0.0;
            let mut batches = 0;

            for start in (0..total).step_by(config.batch_size) {
                let len = config.batch_size.min(total - start);
                let x_batch = x.slice_rows(start, len)?;
                let y_batch = y.slice_rows(start, len)?;

                let predictions = self.forward(&x_batch)?;
                let loss = Loss::new(config.loss, &predictions, &y_batch)?;
                let value = loss.value();

                let mut grad = loss.into_gradient();
                for layer in self.layers.iter_mut().rev() {
                    grad = layer.backward(&grad)?;
                }

                match config.schedule {
                    OptimizerSchedule::PerBatch => {
                        let mut optimizer = config.optimizer.build(lr);
                        for layer in self.layers.iter_mut() {
                            layer.update_params(&mut optimizer)?;
                        }
                    }
                    OptimizerSchedule::Persistent => {
                        for (layer, optimizers) in self.layers.iter_mut().zip(persistent.iter_mut()) {
                            layer.update_params_each(optimizers)?;
                        }
                    }
                }

                debug!(epoch = epoch + 1, batch = batches, start, loss = value, "batch done");
                report.batch_losses.push(value);
                epoch_total += value;
                batches += 1;
            }

            let mean = epoch_total / batches as f32;
            info!(epoch = epoch + 1, epochs = config.epochs, loss = mean, "epoch complete");
            report.epoch_losses.push(mean);
        }

        Ok(report)
    }

    /// Forward pass only; refreshes the layers' forward caches
    #[instrument(skip(self, x), fields(shape = ?x.shape()))]
    pub fn predict(&mut self, x: &Tensor<2>) -> Result<Tensor<2>> {
        self.forward(x)
    }

    /// Fraction of rows whose arg-max prediction equals the label
    pub fn evaluate_accuracy(&mut self, x: &Tensor<2>, labels: &[u8]) -> Result<f32> {
        if x.rows() != labels.len() {
            return Err(Error::InvalidArgument(format!(
                "inputs have {} rows but {} labels were given",
                x.rows(),
                labels.len()
            )));
        }
        if labels.is_empty() {
            return Err(Error::InvalidArgument("no samples to evaluate".to_string()));
        }

        let predictions = self.predict(x)?;
        let correct = predictions
            .argmax_rows()
            .iter()
            .zip(labels)
            .filter(|&(&predicted, &label)| predicted == label as usize)
            .count();
        Ok(correct as f32 / labels.len() as f32)
    }
}
