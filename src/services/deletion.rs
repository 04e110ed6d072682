use std::io;
use tokio::fs;

use super::error::StorageError;
use super::storage::StorageLayout;

#[derive(Debug, Clone)]
pub struct DeletionService {
    layout: StorageLayout,
}

impl DeletionService {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Removes everything stored for `identifier`: staged chunks, the
    /// assembled file, or both. Returns whether anything existed.
    pub async fn delete_all(&self, identifier: &str) -> Result<bool, StorageError> {
        let upload_dir = self.layout.upload_dir(identifier);
        match fs::remove_dir_all(&upload_dir).await {
            Ok(()) => {
                tracing::info!(identifier = %identifier, "Upload deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(identifier = %identifier, "Nothing stored, delete is a no-op");
                Ok(false)
            }
            Err(e) => Err(StorageError::Io {
                op: "delete upload directory",
                path: upload_dir,
                source: e,
            }),
        }
    }
}
