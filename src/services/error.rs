use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::utils::validation::ValidationError;

/// Failures of the filesystem-backed storage engine.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Upload is missing parts {missing:?}")]
    MissingParts { missing: Vec<u32> },
}

impl StorageError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| StorageError::Io { op, path, source }
    }
}

/// Outcome of a rejected upload or delete request.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Too big! Declared size {declared} bytes, limit {max} bytes")]
    TooLarge { declared: u64, max: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Problem deleting upload: {0}")]
    Deletion(#[source] StorageError),
}

impl UploadError {
    /// Whether the client should give up instead of resubmitting. Only the
    /// size limit is final; anything else may succeed on a later attempt.
    pub fn prevent_retry(&self) -> bool {
        matches!(self, UploadError::TooLarge { .. })
    }
}
