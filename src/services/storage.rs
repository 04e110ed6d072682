//! On-disk layout shared by the chunk store, the reassembler and deletion.
//!
//! ```text
//! <root>/<identifier>/<filename>            assembled file
//! <root>/<identifier>/chunks/<part index>   staged chunk, zero padded
//! ```

use std::path::{Path, PathBuf};

use crate::config::CHUNK_DIR_NAME;

/// Number of decimal digits needed to print `n`.
pub fn digits(n: u32) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}

/// Chunk filename for `part_index`, zero padded to the width of `total_parts`
/// so that lexicographic order equals numeric order within one upload.
pub fn chunk_file_name(part_index: u32, total_parts: u32) -> String {
    format!("{:0width$}", part_index, width = digits(total_parts))
}

/// True for names produced by [`chunk_file_name`]. Temporary files never match.
pub fn is_chunk_file_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owning everything stored for `identifier`.
    pub fn upload_dir(&self, identifier: &str) -> PathBuf {
        self.root.join(identifier)
    }

    /// Staging directory for chunks of `identifier`.
    pub fn staging_dir(&self, identifier: &str) -> PathBuf {
        self.upload_dir(identifier).join(CHUNK_DIR_NAME)
    }

    pub fn chunk_path(&self, identifier: &str, part_index: u32, total_parts: u32) -> PathBuf {
        self.staging_dir(identifier)
            .join(chunk_file_name(part_index, total_parts))
    }

    /// Where the assembled file for `identifier` lands.
    pub fn final_path(&self, identifier: &str, filename: &str) -> PathBuf {
        self.upload_dir(identifier).join(filename)
    }
}
