#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use chunk_upload_server::config::UploadConfig;
use chunk_upload_server::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

pub const BOUNDARY: &str = "------------------------chunkboundary";

pub struct TestServer {
    pub app: Router,
    pub config: UploadConfig,
    _dir: TempDir,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut UploadConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = UploadConfig::development(dir.path());
        configure(&mut config);
        std::fs::create_dir_all(&config.upload_dir).unwrap();

        let app = create_app(AppState::new(config.clone()));
        Self {
            app,
            config,
            _dir: dir,
        }
    }

    pub fn upload_path(&self, identifier: &str) -> PathBuf {
        self.config.upload_dir.join(identifier)
    }
}

/// One chunk of an upload, shaped like a Fine Uploader request.
pub struct ChunkRequest<'a> {
    pub uuid: &'a str,
    pub part_index: Option<u32>,
    pub total_parts: Option<u32>,
    pub total_size: u64,
    pub filename: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> ChunkRequest<'a> {
    pub fn part(uuid: &'a str, part_index: u32, total_parts: u32, total_size: u64, data: &'a [u8]) -> Self {
        Self {
            uuid,
            part_index: Some(part_index),
            total_parts: Some(total_parts),
            total_size,
            filename: Some("file.txt"),
            data,
        }
    }

    pub fn into_request(self, file_field: &str) -> Request<Body> {
        let mut body = Vec::new();
        let mut text = |name: &str, value: String| {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        };

        text("qquuid", self.uuid.to_string());
        if let Some(index) = self.part_index {
            text("qqpartindex", index.to_string());
        }
        if let Some(total) = self.total_parts {
            text("qqtotalparts", total.to_string());
        }
        text("qqtotalfilesize", self.total_size.to_string());
        if let Some(filename) = self.filename {
            text("qqfilename", filename.to_string());
        }

        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"blob\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, file_field
            )
            .as_bytes(),
        );
        body.extend_from_slice(self.data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/uploads")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
