//! Client error types

use std::path::PathBuf;

use thiserror::Error;

use crate::client::Phase;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Index {index} out of range for {count} items")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Server answered for {actual}, expected {expected}")]
    ItemMismatch { expected: String, actual: String },

    #[error("Mask length {actual} does not match item length {expected}")]
    MaskLengthMismatch { expected: usize, actual: usize },

    #[error("Server response for {item} disagrees with its shares at bit {position}")]
    ResponseMismatch { item: String, position: usize },

    #[error("Failed to write media file {path}: {source}")]
    MediaWrite {
        path: PathBuf,
        #[source]
        source: vidpir_core::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Server(#[from] vidpir_server::ServerError),

    #[error(transparent)]
    Core(#[from] vidpir_core::Error),
}

impl ClientError {
    /// Failures that end a run early without being faults: an empty
    /// database or an index the catalog cannot satisfy
    pub fn is_graceful(&self) -> bool {
        matches!(
            self,
            ClientError::IndexOutOfRange { .. }
                | ClientError::InvalidInput(_)
                | ClientError::Core(vidpir_core::Error::EmptyDatabase(_))
                | ClientError::Core(vidpir_core::Error::InvalidIndex { .. })
        )
    }
}

/// A client error labelled with the phase it happened in
#[derive(Error, Debug)]
#[error("{phase} phase failed: {source}")]
pub struct PhaseError {
    pub phase: Phase,
    #[source]
    pub source: ClientError,
}

impl PhaseError {
    pub fn new(phase: Phase, source: impl Into<ClientError>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }

    pub fn is_graceful(&self) -> bool {
        self.source.is_graceful()
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
