use tokio::fs;
use tokio::io::AsyncRead;
use validator::Validate;

use crate::config::{CompletionPolicy, UploadConfig};
use crate::models::{ChunkDescriptor, UploadOutcome};
use crate::services::chunk_store::ChunkStore;
use crate::services::deletion::DeletionService;
use crate::services::error::{StorageError, UploadError};
use crate::services::reassembler::{AssembledFile, Reassembler};
use crate::services::storage::StorageLayout;
use crate::utils::keyed_lock::KeyedLock;
use crate::utils::validation::{
    ValidationError, is_valid_size, validate_identifier, validate_part,
};

/// Entry point for the transport layer: accepts chunks, triggers
/// reassembly when an upload is complete and deletes uploads.
///
/// Holds no per-upload state besides the lock table; everything else lives
/// on disk under the configured upload directory.
pub struct UploadService {
    layout: StorageLayout,
    chunks: ChunkStore,
    reassembler: Reassembler,
    deletion: DeletionService,
    locks: KeyedLock,
    max_file_size: u64,
    completion_policy: CompletionPolicy,
}

impl UploadService {
    pub fn new(config: &UploadConfig) -> Self {
        let layout = StorageLayout::new(config.upload_dir.clone());
        Self {
            chunks: ChunkStore::new(layout.clone()),
            reassembler: Reassembler::new(layout.clone()),
            deletion: DeletionService::new(layout.clone()),
            layout,
            locks: KeyedLock::new(),
            max_file_size: config.max_file_size,
            completion_policy: config.completion_policy,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// True when the upload directory exists and is a directory.
    pub async fn storage_ready(&self) -> bool {
        fs::metadata(self.layout.root())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Validates, stores one chunk and reassembles the upload once complete.
    ///
    /// Nothing touches the disk unless the declared size passes the limit.
    pub async fn handle_upload_chunk<R>(
        &self,
        chunk: &ChunkDescriptor,
        payload: R,
    ) -> Result<UploadOutcome, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        chunk
            .validate()
            .map_err(|e| ValidationError::new("INVALID_REQUEST", e.to_string()))?;
        validate_identifier(&chunk.identifier)?;
        validate_part(chunk.part_index, chunk.total_parts)?;

        if !is_valid_size(chunk.total_size, self.max_file_size) {
            tracing::warn!(
                identifier = %chunk.identifier,
                declared = chunk.total_size,
                max = self.max_file_size,
                "Upload rejected, declared size over limit"
            );
            return Err(UploadError::TooLarge {
                declared: chunk.total_size,
                max: self.max_file_size,
            });
        }

        let id = chunk.identifier.as_str();

        let bytes = {
            let _guard = self.locks.read(id).await;
            if self.is_assembled(chunk).await {
                tracing::info!(
                    identifier = %id,
                    part_index = chunk.part_index,
                    "Upload already assembled, ignoring chunk"
                );
                return Ok(UploadOutcome::AlreadyComplete);
            }

            self.chunks
                .store(id, chunk.part_index, chunk.total_parts, payload)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        identifier = %id,
                        part_index = chunk.part_index,
                        "Problem storing chunk: {}",
                        e
                    )
                })?
        };

        if !self.may_be_complete(chunk).await? {
            return Ok(UploadOutcome::Stored {
                part_index: chunk.part_index,
                bytes,
            });
        }

        let outcome = {
            let _guard = self.locks.write(id).await;
            self.complete(chunk).await
        };
        self.locks.cleanup();

        match outcome? {
            Some(assembled) => Ok(UploadOutcome::Assembled(assembled)),
            None if self.is_assembled(chunk).await => Ok(UploadOutcome::AlreadyComplete),
            None => Ok(UploadOutcome::Stored {
                part_index: chunk.part_index,
                bytes,
            }),
        }
    }

    /// Removes all storage for `identifier`. Deleting an unknown identifier
    /// succeeds; the return value tells whether anything existed.
    pub async fn handle_delete(&self, identifier: &str) -> Result<bool, UploadError> {
        validate_identifier(identifier)?;

        let result = {
            let _guard = self.locks.write(identifier).await;
            self.deletion.delete_all(identifier).await
        };
        self.locks.cleanup();

        result.map_err(|e| {
            tracing::error!(identifier = %identifier, "Problem deleting file! {}", e);
            UploadError::Deletion(e)
        })
    }

    async fn is_assembled(&self, chunk: &ChunkDescriptor) -> bool {
        let path = self.layout.final_path(&chunk.identifier, &chunk.filename);
        fs::try_exists(&path).await.unwrap_or(false)
    }

    /// Lock-free pre-check deciding whether reassembly should be attempted.
    async fn may_be_complete(&self, chunk: &ChunkDescriptor) -> Result<bool, UploadError> {
        match self.completion_policy {
            CompletionPolicy::LastIndex => Ok(chunk.is_last_part()),
            CompletionPolicy::AllParts => match self
                .reassembler
                .ensure_complete(&chunk.identifier, chunk.total_parts)
                .await
            {
                Ok(()) => Ok(true),
                Err(StorageError::MissingParts { .. }) => Ok(false),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Runs under the exclusive lock. Returns `None` when another request got
    /// there first or parts went missing in the meantime.
    async fn complete(
        &self,
        chunk: &ChunkDescriptor,
    ) -> Result<Option<AssembledFile>, UploadError> {
        if self.is_assembled(chunk).await {
            return Ok(None);
        }

        if self.completion_policy == CompletionPolicy::AllParts {
            match self
                .reassembler
                .ensure_complete(&chunk.identifier, chunk.total_parts)
                .await
            {
                Ok(()) => {}
                Err(StorageError::MissingParts { missing }) => {
                    tracing::debug!(
                        identifier = %chunk.identifier,
                        ?missing,
                        "Upload not complete yet"
                    );
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let assembled = self
            .reassembler
            .combine(&chunk.identifier, &chunk.filename)
            .await?;
        Ok(Some(assembled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(dir: &TempDir, policy: CompletionPolicy, max: u64) -> UploadService {
        let mut config = UploadConfig::development(dir.path());
        config.completion_policy = policy;
        config.max_file_size = max;
        UploadService::new(&config)
    }

    fn chunk(identifier: &str, part_index: u32, total_parts: u32, total_size: u64) -> ChunkDescriptor {
        ChunkDescriptor {
            identifier: identifier.to_string(),
            part_index,
            total_parts,
            total_size,
            filename: "file.bin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rejects_declared_size_at_limit() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, CompletionPolicy::AllParts, 1000);

        let err = service
            .handle_upload_chunk(&chunk("abc", 0, 1, 1000), &b"data"[..])
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::TooLarge { declared: 1000, max: 1000 }));
        assert!(err.prevent_retry());
        assert!(!service.layout().upload_dir("abc").exists());
    }

    #[tokio::test]
    async fn test_invalid_requests_do_not_touch_disk() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, CompletionPolicy::AllParts, 0);

        for bad in [chunk("../x", 0, 1, 10), chunk("abc", 3, 3, 10), chunk("abc", 0, 0, 10)] {
            let err = service
                .handle_upload_chunk(&bad, &b"data"[..])
                .await
                .unwrap_err();
            assert!(matches!(err, UploadError::InvalidRequest(_)), "{bad:?}");
            assert!(!err.prevent_retry());
        }
        assert!(!service.layout().upload_dir("abc").exists());
    }

    #[tokio::test]
    async fn test_complete_skips_upload_with_missing_parts() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, CompletionPolicy::AllParts, 0);

        service.chunks.store("abc", 0, 2, &b"a"[..]).await.unwrap();

        assert_eq!(service.complete(&chunk("abc", 1, 2, 2)).await.unwrap(), None);
        assert!(service.layout().staging_dir("abc").exists());
        assert!(!service.may_be_complete(&chunk("abc", 0, 2, 2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_all_parts_policy_waits_for_every_part() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, CompletionPolicy::AllParts, 1_000_000);

        let first = service
            .handle_upload_chunk(&chunk("abc", 0, 3, 300_000), &b"payload0"[..])
            .await
            .unwrap();
        assert_eq!(first, UploadOutcome::Stored { part_index: 0, bytes: 8 });

        // last index arrives before the middle part
        let last = service
            .handle_upload_chunk(&chunk("abc", 2, 3, 300_000), &b"payload2"[..])
            .await
            .unwrap();
        assert!(matches!(last, UploadOutcome::Stored { part_index: 2, .. }));
        assert!(!service.layout().final_path("abc", "file.bin").exists());

        let middle = service
            .handle_upload_chunk(&chunk("abc", 1, 3, 300_000), &b"payload1"[..])
            .await
            .unwrap();
        let assembled = match middle {
            UploadOutcome::Assembled(assembled) => assembled,
            other => panic!("expected reassembly, got {other:?}"),
        };
        assert_eq!(assembled.parts, 3);

        let content = fs::read(&assembled.path).await.unwrap();
        assert_eq!(content, b"payload0payload1payload2");
        assert!(!service.layout().staging_dir("abc").exists());
    }

    #[tokio::test]
    async fn test_last_index_policy_combines_on_last_part() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, CompletionPolicy::LastIndex, 0);

        service
            .handle_upload_chunk(&chunk("abc", 0, 3, 24), &b"payload0"[..])
            .await
            .unwrap();
        service
            .handle_upload_chunk(&chunk("abc", 1, 3, 24), &b"payload1"[..])
            .await
            .unwrap();
        let outcome = service
            .handle_upload_chunk(&chunk("abc", 2, 3, 24), &b"payload2"[..])
            .await
            .unwrap();

        assert!(matches!(outcome, UploadOutcome::Assembled(_)));
        let content = fs::read(service.layout().final_path("abc", "file.bin"))
            .await
            .unwrap();
        assert_eq!(content, b"payload0payload1payload2");
    }

    #[tokio::test]
    async fn test_last_index_policy_does_not_check_for_gaps() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, CompletionPolicy::LastIndex, 0);

        service
            .handle_upload_chunk(&chunk("gap", 0, 3, 0), &b"a"[..])
            .await
            .unwrap();
        let outcome = service
            .handle_upload_chunk(&chunk("gap", 2, 3, 0), &b"c"[..])
            .await
            .unwrap();

        assert!(matches!(outcome, UploadOutcome::Assembled(_)));
        let content = fs::read(service.layout().final_path("gap", "file.bin"))
            .await
            .unwrap();
        assert_eq!(content, b"ac");
    }

    #[tokio::test]
    async fn test_retried_chunk_after_completion_is_acknowledged() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, CompletionPolicy::AllParts, 0);

        service
            .handle_upload_chunk(&chunk("once", 0, 1, 4), &b"only"[..])
            .await
            .unwrap();
        let again = service
            .handle_upload_chunk(&chunk("once", 0, 1, 4), &b"XXXX"[..])
            .await
            .unwrap();

        assert_eq!(again, UploadOutcome::AlreadyComplete);
        let content = fs::read(service.layout().final_path("once", "file.bin"))
            .await
            .unwrap();
        assert_eq!(content, b"only");
        assert!(!service.layout().staging_dir("once").exists());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, CompletionPolicy::AllParts, 0);

        service
            .handle_upload_chunk(&chunk("gone", 0, 2, 8), &b"half"[..])
            .await
            .unwrap();

        assert!(service.handle_delete("gone").await.unwrap());
        assert!(!service.handle_delete("gone").await.unwrap());
        assert!(!service.layout().upload_dir("gone").exists());
    }

    #[tokio::test]
    async fn test_delete_rejects_unsafe_identifier() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, CompletionPolicy::AllParts, 0);

        let err = service.handle_delete("..").await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_storage_failure_is_retryable() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, CompletionPolicy::AllParts, 0);

        // a plain file where the upload directory should be
        std::fs::create_dir_all(service.layout().root()).unwrap();
        std::fs::write(service.layout().upload_dir("blocked"), b"in the way").unwrap();

        let err = service
            .handle_upload_chunk(&chunk("blocked", 0, 2, 8), &b"data"[..])
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Storage(StorageError::Io { .. })));
        assert!(!err.prevent_retry());
    }
}
