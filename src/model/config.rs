use serde::{Deserialize, Serialize};

use super::error::ModelError;

/// Hyperparameters for one training run. Immutable once training starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperparams {
    pub batch_size: usize,
    /// Input feature width.
    pub x_size: usize,
    /// Widths of the two hidden layers.
    pub hidden: [usize; 2],
    /// Output width (number of classes).
    pub y_size: usize,
    pub learning_rate: f32,
    /// Coefficient on the mean L2 penalty over all parameters.
    pub regularization: f32,
    pub epochs: usize,
    /// Number of samples in the training corpus.
    pub total_size: usize,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            batch_size: 10,
            x_size: 2,
            hidden: [32, 16],
            y_size: 2,
            learning_rate: 0.01,
            regularization: 0.01,
            epochs: 10,
            total_size: 50,
        }
    }
}

impl Hyperparams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.batch_size == 0
            || self.x_size == 0
            || self.hidden[0] == 0
            || self.hidden[1] == 0
            || self.y_size == 0
        {
            return Err(ModelError::Config(
                "all layer sizes and batch_size must be non-zero".into(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ModelError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.regularization < 0.0 {
            return Err(ModelError::Config(format!(
                "regularization must be non-negative, got {}",
                self.regularization
            )));
        }
        Ok(())
    }

    /// Audit string embedded in checkpoint and summary-run names.
    /// Human-readable only; nothing parses it back.
    pub fn run_mark(&self) -> String {
        format!("hidden_layer_{}_epoch_{}", self.hidden[0], self.epochs)
    }
}
