use crate::config::UploadConfig;
use crate::services::upload_service::UploadService;
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// Creates the upload directory if needed and builds the upload service
/// rooted there.
pub async fn setup_storage(config: &UploadConfig) -> anyhow::Result<Arc<UploadService>> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create upload directory {}",
                config.upload_dir.display()
            )
        })?;

    info!(
        "💾 Upload storage: {} (completion: {})",
        config.upload_dir.display(),
        config.completion_policy
    );

    Ok(Arc::new(UploadService::new(config)))
}
