//! The fixed 3-layer feed-forward network and its configuration.

pub mod config;
pub mod error;
pub mod mlp;

pub use config::Hyperparams;
pub use error::ModelError;
pub use mlp::{Gradients, Mlp};
