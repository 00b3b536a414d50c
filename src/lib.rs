//! A small supervised training loop: a fixed 3-layer feed-forward network
//! (two leaky-ReLU hidden layers), softmax cross-entropy with an L2
//! penalty, Adam under exponential learning-rate decay, and best-loss
//! checkpointing with rotation.

pub mod error;
pub mod model;
pub mod training;

pub use error::TrainError;
pub use model::{Hyperparams, Mlp, ModelError};
pub use training::{Adam, BatchSource, Checkpoint, InMemorySource, Trainer, TrainerConfig};
