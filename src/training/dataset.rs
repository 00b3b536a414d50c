use ndarray::{s, Array2};
use thiserror::Error;

/// Mid-batch data failure. End-of-epoch exhaustion is *not* an error; it is
/// `Ok(None)` from [`BatchSource::next_batch`].
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("data source error: {0}")]
    Source(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One training batch: features `[batch, x_size]` and one-hot/soft targets
/// `[batch, y_size]`.
pub struct Batch {
    pub x: Array2<f32>,
    pub y: Array2<f32>,
}

/// Restartable, finite, per-epoch sequence of batches. The trainer calls
/// `reset` at the start of every epoch and steps until `Ok(None)`.
pub trait BatchSource {
    fn reset(&mut self) -> Result<(), DatasetError>;
    fn next_batch(&mut self) -> Result<Option<Batch>, DatasetError>;
}

/// In-memory source backed by a fixed `(x, y)` matrix pair, sliced into
/// full batches in order. A trailing partial batch is dropped.
pub struct InMemorySource {
    x: Array2<f32>,
    y: Array2<f32>,
    batch_size: usize,
    cursor: usize,
}

impl InMemorySource {
    pub fn new(x: Array2<f32>, y: Array2<f32>, batch_size: usize) -> Result<Self, DatasetError> {
        if x.nrows() != y.nrows() {
            return Err(DatasetError::Source(format!(
                "{} feature rows but {} target rows",
                x.nrows(),
                y.nrows()
            )));
        }
        if batch_size == 0 {
            return Err(DatasetError::Source("batch_size must be non-zero".into()));
        }
        Ok(Self {
            x,
            y,
            batch_size,
            cursor: 0,
        })
    }
}

impl BatchSource for InMemorySource {
    fn reset(&mut self) -> Result<(), DatasetError> {
        self.cursor = 0;
        Ok(())
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, DatasetError> {
        let end = self.cursor + self.batch_size;
        if end > self.x.nrows() {
            return Ok(None);
        }
        let batch = Batch {
            x: self.x.slice(s![self.cursor..end, ..]).to_owned(),
            y: self.y.slice(s![self.cursor..end, ..]).to_owned(),
        };
        self.cursor = end;
        Ok(Some(batch))
    }
}
