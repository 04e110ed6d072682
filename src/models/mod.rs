use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::services::reassembler::AssembledFile;
use crate::utils::validation::{MAX_FILENAME_LEN, MAX_IDENTIFIER_LEN};

/// Placement metadata for one chunk of an upload. The chunk bytes travel
/// separately as a stream.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct ChunkDescriptor {
    #[validate(length(min = 1, max = MAX_IDENTIFIER_LEN))]
    pub identifier: String,
    pub part_index: u32,
    #[validate(range(min = 1))]
    pub total_parts: u32,
    pub total_size: u64,
    #[validate(length(min = 1, max = MAX_FILENAME_LEN))]
    pub filename: String,
}

impl ChunkDescriptor {
    pub fn is_last_part(&self) -> bool {
        self.total_parts.checked_sub(1) == Some(self.part_index)
    }
}

/// What happened to an accepted chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Chunk stored, more parts outstanding.
    Stored { part_index: u32, bytes: u64 },
    /// Chunk stored and the upload was reassembled.
    Assembled(AssembledFile),
    /// The final file already existed; nothing was written.
    AlreadyComplete,
}

/// Multipart form of `POST /uploads`, documented in the OpenAPI schema.
/// The handler reads the same fields off the stream as they arrive.
#[derive(Debug, Clone, ToSchema)]
pub struct ChunkUploadForm {
    /// Client-generated upload identifier
    pub qquuid: String,
    /// Zero-based part index, absent for single-request uploads
    pub qqpartindex: Option<u32>,
    /// Number of parts, absent for single-request uploads
    pub qqtotalparts: Option<u32>,
    /// Declared size of the whole file in bytes
    pub qqtotalfilesize: u64,
    /// Original filename
    pub qqfilename: Option<String>,
    /// Chunk bytes; the field name is configurable and must come last
    #[schema(value_type = String, format = Binary)]
    pub qqfile: Vec<u8>,
}

/// Response body understood by Fine Uploader style clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        default,
        rename = "preventRetry",
        skip_serializing_if = "Option::is_none"
    )]
    pub prevent_retry: Option<bool>,
}

impl UploadResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            prevent_retry: None,
        }
    }

    pub fn failure(error: impl Into<String>, prevent_retry: bool) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            prevent_retry: prevent_retry.then_some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_body_has_only_success() {
        let body = serde_json::to_value(UploadResponse::ok()).unwrap();
        assert_eq!(body, json!({ "success": true }));
    }

    #[test]
    fn test_too_big_body() {
        let body = serde_json::to_value(UploadResponse::failure("Too big!", true)).unwrap();
        assert_eq!(
            body,
            json!({ "success": false, "error": "Too big!", "preventRetry": true })
        );
    }

    #[test]
    fn test_retryable_failure_omits_prevent_retry() {
        let body = serde_json::to_value(UploadResponse::failure("disk full", false)).unwrap();
        assert_eq!(body, json!({ "success": false, "error": "disk full" }));
    }

    #[test]
    fn test_descriptor_validation() {
        let mut chunk = ChunkDescriptor {
            identifier: "abc".to_string(),
            part_index: 2,
            total_parts: 3,
            total_size: 300_000,
            filename: "file.bin".to_string(),
        };
        assert!(chunk.validate().is_ok());
        assert!(chunk.is_last_part());

        chunk.total_parts = 0;
        assert!(chunk.validate().is_err());
    }

    #[test]
    fn test_descriptor_length_limits() {
        let mut chunk = ChunkDescriptor {
            identifier: "x".repeat(MAX_IDENTIFIER_LEN as usize),
            part_index: 0,
            total_parts: 1,
            total_size: 1,
            filename: "a".repeat(MAX_FILENAME_LEN as usize),
        };
        assert!(chunk.validate().is_ok());

        chunk.identifier.push('x');
        assert!(chunk.validate().is_err());

        chunk.identifier.pop();
        chunk.filename.push('a');
        assert!(chunk.validate().is_err());
    }
}
