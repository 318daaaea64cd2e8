//! Error types for string kernel computation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource exhausted: could not allocate {requested} kernel cells")]
    ResourceExhausted { requested: usize },

    #[error("Numerical range exceeded: {0}")]
    NumericalRange(String),

    #[error("Kernel matrix build cancelled after {completed_rows} rows")]
    Cancelled { completed_rows: usize },

    #[error("Index out of range: {index} (collection has {len} sequences)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, KernelError>;
