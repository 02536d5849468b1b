//! Error types for the index, search and indexing layers

use std::path::PathBuf;

/// Errors surfaced by the index store, search engine and coordinator.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid embedding for {image_id}: {reason}")]
    InvalidEmbedding { image_id: String, reason: String },

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("An index build is already in progress")]
    AlreadyIndexing,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Image not found in index: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-image extraction failures. A build logs these and skips the image.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Extraction timed out after {secs}s for {path:?}")]
    Timeout { path: PathBuf, secs: u64 },

    #[error("{tool} failed on {path:?}: {message}")]
    Tool {
        tool: String,
        path: PathBuf,
        message: String,
    },

    #[error("Embedding service error: {0}")]
    Service(String),

    #[error("Extractor produced an unusable vector for {path:?}: {reason}")]
    BadVector { path: PathBuf, reason: String },
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;
