//! Reassembler
//!
//! Concatenates the staged chunks of one upload, in part-index order, into
//! the final file and then drops the staging area.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::error::StorageError;
use super::storage::{StorageLayout, digits, is_chunk_file_name};

/// Upper bound on the indices carried by a missing-parts error.
const MAX_REPORTED_MISSING: usize = 32;

/// Result of a successful reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFile {
    pub path: PathBuf,
    pub parts: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct Reassembler {
    layout: StorageLayout,
}

impl Reassembler {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Names of the chunks currently staged for `identifier`, sorted.
    ///
    /// A missing staging directory yields an empty list.
    pub async fn staged_chunks(&self, identifier: &str) -> Result<Vec<String>, StorageError> {
        let staging_dir = self.layout.staging_dir(identifier);
        let mut entries = match fs::read_dir(&staging_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::Io {
                    op: "list staging directory",
                    path: staging_dir,
                    source: e,
                });
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(StorageError::io("list staging directory", &staging_dir))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if is_chunk_file_name(name) {
                    names.push(name.to_string());
                }
            }
        }

        // Fixed-width names: lexicographic order is part-index order
        names.sort();
        Ok(names)
    }

    /// Indices in `0..total_parts` that have a chunk staged under the name
    /// width of `total_parts`.
    async fn staged_parts(
        &self,
        identifier: &str,
        total_parts: u32,
    ) -> Result<BTreeSet<u32>, StorageError> {
        let width = digits(total_parts);
        Ok(self
            .staged_chunks(identifier)
            .await?
            .into_iter()
            .filter(|name| name.len() == width)
            .filter_map(|name| name.parse::<u32>().ok())
            .filter(|&index| index < total_parts)
            .collect())
    }

    /// Succeeds once every part `0..total_parts` is staged. Otherwise fails
    /// with [`StorageError::MissingParts`] listing the lowest absent indices.
    pub async fn ensure_complete(
        &self,
        identifier: &str,
        total_parts: u32,
    ) -> Result<(), StorageError> {
        let staged = self.staged_parts(identifier, total_parts).await?;
        if staged.len() as u64 == u64::from(total_parts) {
            return Ok(());
        }

        let missing = (0..total_parts)
            .filter(|index| !staged.contains(index))
            .take(MAX_REPORTED_MISSING)
            .collect();
        Err(StorageError::MissingParts { missing })
    }

    /// Concatenates every staged chunk of `identifier` into `final_filename`.
    ///
    /// The output is built in a hidden temporary file and renamed into place
    /// only after the last chunk was copied. Any failure removes that
    /// temporary and leaves the staging area untouched.
    pub async fn combine(
        &self,
        identifier: &str,
        final_filename: &str,
    ) -> Result<AssembledFile, StorageError> {
        let staging_dir = self.layout.staging_dir(identifier);
        let chunk_paths: Vec<PathBuf> = self
            .staged_chunks(identifier)
            .await?
            .into_iter()
            .map(|name| staging_dir.join(name))
            .collect();

        let destination = self.layout.final_path(identifier, final_filename);
        let assembling = self.layout.upload_dir(identifier).join(format!(
            ".{}.{}.assembling",
            final_filename,
            Uuid::new_v4()
        ));

        let parts = chunk_paths.len();
        let bytes = match concatenate(chunk_paths, &assembling).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(
                    identifier = %identifier,
                    "Problem appending chunk: {}",
                    e
                );
                if let Err(rm) = fs::remove_file(&assembling).await {
                    if rm.kind() != io::ErrorKind::NotFound {
                        tracing::warn!("Could not remove {}: {}", assembling.display(), rm);
                    }
                }
                return Err(e);
            }
        };

        fs::rename(&assembling, &destination)
            .await
            .map_err(StorageError::io("move assembled file to", &destination))?;

        // the final file is in place from here on; a stale staging area is
        // only worth a warning
        remove_staging(&staging_dir).await;

        tracing::info!(
            identifier = %identifier,
            parts,
            bytes,
            path = %destination.display(),
            "Upload reassembled"
        );

        Ok(AssembledFile {
            path: destination,
            parts,
            bytes,
        })
    }
}

/// Drops a staging directory, returning whether it is gone afterwards.
async fn remove_staging(staging_dir: &Path) -> bool {
    match fs::remove_dir_all(staging_dir).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(
                "Could not remove staging directory {}: {}",
                staging_dir.display(),
                e
            );
            false
        }
    }
}

/// Copies each source into `destination` strictly one after another,
/// stopping at the first error.
async fn concatenate<I>(sources: I, destination: &Path) -> Result<u64, StorageError>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .await
        .map_err(StorageError::io("create", destination))?;

    let mut total = 0u64;
    for source in sources {
        let mut input = File::open(&source)
            .await
            .map_err(StorageError::io("open chunk", &source))?;
        total += tokio::io::copy(&mut input, &mut output)
            .await
            .map_err(StorageError::io("append chunk", &source))?;
        // `input` is closed here, before the next chunk is opened
    }

    output
        .flush()
        .await
        .map_err(StorageError::io("flush", destination))?;
    output
        .sync_all()
        .await
        .map_err(StorageError::io("sync", destination))?;

    Ok(total)
}
