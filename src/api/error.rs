use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::UploadResponse;
use crate::services::error::UploadError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                UploadResponse::failure(msg, false),
            ),
            AppError::Upload(e) => {
                let status = match &e {
                    UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    UploadError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    UploadError::Storage(_) | UploadError::Deletion(_) => {
                        tracing::error!("Storage error: {}", e);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                let message = match &e {
                    UploadError::TooLarge { .. } => "Too big!".to_string(),
                    UploadError::InvalidRequest(v) => v.message.clone(),
                    _ => e.to_string(),
                };
                (status, UploadResponse::failure(message, e.prevent_retry()))
            }
        };

        (status, Json(body)).into_response()
    }
}
