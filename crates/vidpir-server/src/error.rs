//! Server error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Share read failed for {item}: {source}")]
    ShareRead {
        item: String,
        #[source]
        source: vidpir_core::Error,
    },

    #[error("Query length mismatch: store has {expected} items, query has {actual} entries")]
    QueryLengthMismatch { expected: usize, actual: usize },

    #[error("Combination inputs differ in length: expected {expected} bits, got {actual}")]
    InputLengthMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Core(#[from] vidpir_core::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
