pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::handlers::{health, uploads};
use crate::api::middleware::request_id::{REQUEST_ID_HEADER, request_id_middleware};
use crate::config::UploadConfig;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::uploads::upload_chunk,
        api::handlers::uploads::delete_upload,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            models::ChunkUploadForm,
            api::handlers::health::HealthResponse,
            models::UploadResponse,
        )
    ),
    tags(
        (name = "uploads", description = "Chunked upload endpoints"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub upload_service: Arc<UploadService>,
    pub config: UploadConfig,
}

impl AppState {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            upload_service: Arc::new(UploadService::new(&config)),
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = match state.config.body_limit() {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };
    let public_dir = ServeDir::new(&state.config.public_dir).append_index_html_on_directories(true);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .route("/uploads", post(uploads::upload_chunk).layer(body_limit))
        .route("/uploads/:uuid", delete(uploads::delete_upload))
        .fallback_service(public_dir)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(&REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        // outermost, so the trace span sees generated ids too
        .layer(from_fn(request_id_middleware))
}
