use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("initialization error: {0}")]
    Init(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
