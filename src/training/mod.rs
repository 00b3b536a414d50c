//! The training loop and its collaborators: optimizer, data source,
//! checkpoint store, and scalar summaries.

pub mod adam;
pub mod checkpoint;
pub mod dataset;
pub mod metrics;
pub mod trainer;

pub use adam::Adam;
pub use checkpoint::{load_checkpoint, save_checkpoint, Checkpoint};
pub use dataset::{Batch, BatchSource, DatasetError, InMemorySource};
pub use metrics::SummaryWriter;
pub use trainer::{Trainer, TrainerConfig};
