use std::io;

/// Errors surfaced by network construction, training, inference and persistence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fewer than two layers, or a layer with no neurons.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// A vector or matrix does not have the width the next step needs.
    #[error("shape mismatch: expected length {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Inputs and targets of a dataset differ in length.
    #[error("dataset mismatch: {inputs} inputs but {targets} targets")]
    DatasetMismatch { inputs: usize, targets: usize },

    #[error("unknown activation function `{0}`")]
    UnknownActivation(String),

    /// A parameter file name without the `.json` suffix.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("file not found: {0}")]
    NotFound(String),

    /// A parameter record that is missing fields or cannot be rebuilt into matrices.
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
