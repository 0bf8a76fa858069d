//! Error types for vidpir-core

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Codec error on {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Share directory missing: {0}")]
    DirectoryMissing(PathBuf),

    #[error("No items found in {0}")]
    EmptyDatabase(PathBuf),

    #[error("Invalid index: {index} >= {count}")]
    InvalidIndex { index: usize, count: usize },

    #[error("Item {item} not found in share {share}")]
    NotFound { item: String, share: String },

    #[error("Share length mismatch for {item}: D0 has {share_a} bits, D1 has {share_b}")]
    ShareLengthMismatch {
        item: String,
        share_a: usize,
        share_b: usize,
    },

    #[error("Length mismatch: expected {expected} bits, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Failed to persist masks to {path}: {source}")]
    MaskPersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wrap an IO error with the path it occurred on
    pub fn codec(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Codec {
            path: path.into(),
            source,
        }
    }
}
