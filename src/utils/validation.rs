use std::path::Path;
use thiserror::Error;

use crate::config::CHUNK_DIR_NAME;

/// Longest identifier accepted as a storage path segment
pub const MAX_IDENTIFIER_LEN: u64 = 128;

/// Longest stored filename, matching common filesystem limits
pub const MAX_FILENAME_LEN: u64 = 255;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Size gate for an upload's declared total size.
///
/// A `max_file_size` of 0 disables the check. Otherwise the declared size
/// must be strictly below the maximum.
pub fn is_valid_size(declared_total_size: u64, max_file_size: u64) -> bool {
    max_file_size == 0 || declared_total_size < max_file_size
}

/// Checks that an upload identifier can be used as a single directory name.
pub fn validate_identifier(identifier: &str) -> Result<(), ValidationError> {
    if identifier.is_empty() {
        return Err(ValidationError::new(
            "INVALID_IDENTIFIER",
            "Upload identifier cannot be empty",
        ));
    }

    if identifier.len() as u64 > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::new(
            "INVALID_IDENTIFIER",
            format!("Upload identifier exceeds {} characters", MAX_IDENTIFIER_LEN),
        ));
    }

    if !identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        tracing::warn!("Rejected unsafe upload identifier: {:?}", identifier);
        return Err(ValidationError::new(
            "INVALID_IDENTIFIER",
            "Upload identifier may only contain letters, digits, '-' and '_'",
        ));
    }

    Ok(())
}

/// Reduces a client-supplied filename to a safe single path component.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    // Clients on Windows send backslash-separated paths
    let normalized = filename.replace('\\', "/");
    let name = Path::new(&normalized)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if normalized.contains("..") || normalized.contains('/') {
        tracing::warn!("Path components stripped from filename: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    let sanitized = sanitized.trim().to_string();

    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            "Filename cannot be empty",
        ));
    }

    if sanitized == CHUNK_DIR_NAME {
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            format!("Filename '{}' is reserved", CHUNK_DIR_NAME),
        ));
    }

    if sanitized.len() as u64 > MAX_FILENAME_LEN {
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            format!("Filename exceeds {} bytes", MAX_FILENAME_LEN),
        ));
    }

    Ok(sanitized)
}

/// Checks the part index against the declared part count.
pub fn validate_part(part_index: u32, total_parts: u32) -> Result<(), ValidationError> {
    if total_parts == 0 {
        return Err(ValidationError::new(
            "INVALID_PART",
            "Total part count must be at least 1",
        ));
    }

    if part_index >= total_parts {
        return Err(ValidationError::new(
            "INVALID_PART",
            format!(
                "Part index {} is out of range for {} parts",
                part_index, total_parts
            ),
        ));
    }

    Ok(())
}
