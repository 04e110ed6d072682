//! Chunk Store
//!
//! Writes individual chunks into an upload's staging directory.

use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

use super::error::StorageError;
use super::storage::{StorageLayout, chunk_file_name};

#[derive(Debug, Clone)]
pub struct ChunkStore {
    layout: StorageLayout,
}

impl ChunkStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Streams `payload` into the staging slot for `part_index` and returns the
    /// number of bytes written.
    ///
    /// Bytes land in a uniquely named temporary file that is renamed onto the
    /// chunk name only after a successful flush, so a failed or aborted write
    /// never leaves a file that looks like a received part. Storing the same
    /// part again replaces the previous chunk.
    pub async fn store<R>(
        &self,
        identifier: &str,
        part_index: u32,
        total_parts: u32,
        mut payload: R,
    ) -> Result<u64, StorageError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let staging_dir = self.layout.staging_dir(identifier);
        // create_dir_all tolerates a concurrent creator
        fs::create_dir_all(&staging_dir)
            .await
            .map_err(StorageError::io("create staging directory", &staging_dir))?;

        let chunk_name = chunk_file_name(part_index, total_parts);
        let destination = staging_dir.join(&chunk_name);
        let partial = staging_dir.join(format!("{}.{}.partial", chunk_name, Uuid::new_v4()));

        let written = match write_file(&partial, &mut payload).await {
            Ok(written) => written,
            Err(e) => {
                discard(&partial).await;
                return Err(e);
            }
        };

        if let Err(source) = fs::rename(&partial, &destination).await {
            discard(&partial).await;
            return Err(StorageError::Io {
                op: "finalize chunk",
                path: destination,
                source,
            });
        }

        tracing::debug!(
            identifier = %identifier,
            part_index,
            total_parts,
            bytes = written,
            "Chunk stored"
        );

        Ok(written)
    }
}

async fn write_file<R>(path: &Path, payload: &mut R) -> Result<u64, StorageError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut file = File::create(path)
        .await
        .map_err(StorageError::io("create chunk", path))?;

    let written = tokio::io::copy(payload, &mut file)
        .await
        .map_err(StorageError::io("write chunk", path))?;

    file.flush()
        .await
        .map_err(StorageError::io("flush chunk", path))?;
    file.sync_all()
        .await
        .map_err(StorageError::io("sync chunk", path))?;

    Ok(written)
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Could not remove partial chunk {}: {}", path.display(), e);
        }
    }
}
