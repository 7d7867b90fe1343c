//! Error types shared across the assistant.

use std::path::PathBuf;

/// Failure to read, parse, validate, or write the medication list.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("medication file {} is malformed: {source}", path.display())]
    MalformedStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to {op} {}: {source}", path.display())]
    StorageIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize medication list: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StorageIo {
            op,
            path: path.into(),
            source,
        }
    }
}

/// A manually entered medication is incomplete or badly formed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("time {0:?} is not in 24-hour HH:MM format")]
    InvalidTime(String),
}

/// Why a voice capture produced no transcript.
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("no speech started within {0:.1}s")]
    Timeout(f64),
    #[error("speech could not be understood")]
    Unintelligible,
    #[error("microphone error: {0}")]
    Device(String),
    #[error("recognition failed: {0}")]
    Service(String),
    #[error("speech recognition unavailable: {0}")]
    Unavailable(String),
}
