use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use futures::TryStreamExt;
use std::str::FromStr;
use tokio_util::io::StreamReader;

use crate::AppState;
use crate::api::error::AppError;
use crate::models::{ChunkDescriptor, ChunkUploadForm, UploadOutcome, UploadResponse};
use crate::services::error::UploadError;
use crate::utils::validation::sanitize_filename;

/// Text fields collected before the file field arrives.
#[derive(Debug, Default)]
struct UploadFields {
    uuid: Option<String>,
    part_index: Option<String>,
    total_parts: Option<String>,
    total_size: Option<String>,
    filename: Option<String>,
}

impl UploadFields {
    fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "qquuid" => &mut self.uuid,
            "qqpartindex" => &mut self.part_index,
            "qqtotalparts" => &mut self.total_parts,
            "qqtotalfilesize" => &mut self.total_size,
            "qqfilename" => &mut self.filename,
            _ => return,
        };
        *slot = Some(value);
    }

    fn into_descriptor(self, fallback_filename: Option<&str>) -> Result<ChunkDescriptor, AppError> {
        let identifier = self
            .uuid
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing qquuid".to_string()))?;

        let (part_index, total_parts) = match (self.part_index, self.total_parts) {
            (Some(index), Some(total)) => (
                parse_field("qqpartindex", &index)?,
                parse_field("qqtotalparts", &total)?,
            ),
            // not chunked: the whole file in one request
            (None, None) => (0, 1),
            _ => {
                return Err(AppError::BadRequest(
                    "qqpartindex and qqtotalparts must be sent together".to_string(),
                ));
            }
        };

        let total_size = self
            .total_size
            .ok_or_else(|| AppError::BadRequest("Missing qqtotalfilesize".to_string()))
            .and_then(|v| parse_field("qqtotalfilesize", &v))?;

        let original = self
            .filename
            .or_else(|| fallback_filename.map(str::to_string))
            .ok_or_else(|| AppError::BadRequest("Missing qqfilename".to_string()))?;
        let filename =
            sanitize_filename(&original).map_err(|e| AppError::Upload(UploadError::from(e)))?;

        Ok(ChunkDescriptor {
            identifier,
            part_index,
            total_parts,
            total_size,
            filename,
        })
    }
}

fn parse_field<T: FromStr>(name: &str, value: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {}: {:?}", name, value)))
}

#[utoipa::path(
    post,
    path = "/uploads",
    request_body(content = ChunkUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Chunk stored", body = UploadResponse),
        (status = 400, description = "Malformed upload request", body = UploadResponse),
        (status = 413, description = "Declared file size over the limit", body = UploadResponse),
        (status = 500, description = "Storage failure, safe to retry", body = UploadResponse)
    ),
    tag = "uploads"
)]
pub async fn upload_chunk(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut fields = UploadFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == state.config.file_input_name {
            let fallback_filename = field.file_name().map(str::to_string);
            let chunk = fields.into_descriptor(fallback_filename.as_deref())?;

            // stream straight from the request body to disk
            let payload = StreamReader::new(field.map_err(std::io::Error::other));
            let outcome = state
                .upload_service
                .handle_upload_chunk(&chunk, payload)
                .await?;

            match outcome {
                UploadOutcome::Stored { part_index, bytes } => tracing::debug!(
                    identifier = %chunk.identifier,
                    part_index,
                    total_parts = chunk.total_parts,
                    bytes,
                    "📦 Chunk received"
                ),
                UploadOutcome::Assembled(file) => tracing::info!(
                    identifier = %chunk.identifier,
                    parts = file.parts,
                    bytes = file.bytes,
                    "✅ Upload complete: {}",
                    chunk.filename
                ),
                UploadOutcome::AlreadyComplete => tracing::info!(
                    identifier = %chunk.identifier,
                    "Duplicate chunk for finished upload"
                ),
            }

            return Ok(Json(UploadResponse::ok()));
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        fields.set(&name, value);
    }

    Err(AppError::BadRequest(format!(
        "No file provided in field '{}'",
        state.config.file_input_name
    )))
}

#[utoipa::path(
    delete,
    path = "/uploads/{uuid}",
    params(
        ("uuid" = String, Path, description = "Upload identifier")
    ),
    responses(
        (status = 204, description = "Upload removed, or nothing was stored"),
        (status = 400, description = "Unsafe identifier"),
        (status = 500, description = "Problem deleting file")
    ),
    tag = "uploads"
)]
pub async fn delete_upload(State(state): State<AppState>, Path(uuid): Path<String>) -> StatusCode {
    match state.upload_service.handle_delete(&uuid).await {
        Ok(_) => StatusCode::NO_CONTENT,
        Err(UploadError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
