use std::path::PathBuf;

use thiserror::Error;

/// The image bytes could not be turned into a pixel grid.
#[derive(Debug, Error)]
#[error("cannot decode image: {reason}")]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown media id: {0}")]
    UnknownMedia(String),

    #[error("media {0} has no cached image to read")]
    NoImageSource(String),

    #[error("catalog was not opened from a file")]
    NoBackingFile,
}

/// Outcome of fingerprinting a single asset.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
