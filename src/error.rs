//! Error types shared by the ingestion, storage and model layers.

use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, RecError>;

#[derive(Error, Debug)]
pub enum RecError {
    /// Reading the dump or writing an output file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A TSV file could not be read or written
    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A caller-supplied parameter is out of its valid range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// An operation needs at least one element to produce a value
    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    /// Training was interrupted through its cancellation flag
    #[error("Training cancelled after {epochs_completed} completed epochs")]
    Cancelled { epochs_completed: usize },
}

impl RecError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}
