//! Error types for the pairwise SVM

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SVMError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("No training instances left after removing instances with weight 0")]
    ZeroWeight,

    #[error("Training was cancelled")]
    Cancelled,

    #[error("Internal invariant violated: {0}")]
    Internal(String),

    #[error("Model not trained")]
    ModelNotTrained,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SVMError {
    /// True for the cancellation outcome, as opposed to a data or configuration failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SVMError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, SVMError>;
