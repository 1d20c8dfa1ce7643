use crate::record::RecordId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the idea pipeline operations
#[derive(Debug, Error)]
pub(crate) enum PipelineError {
    #[error("Transcript is empty")]
    InvalidInput,

    #[error("No saved idea is loaded; create one before expanding")]
    InvalidState,

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Record store errors
#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("No idea record with id {0}")]
    NotFound(RecordId),

    #[error("Store file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode store contents: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to read store file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write store file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Text generation errors
#[derive(Debug, Error)]
pub(crate) enum GenerationError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },
}

/// Speech transcription errors
#[derive(Debug, Error)]
pub(crate) enum TranscribeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Transcription produced no text")]
    EmptyTranscript,
}
