use chunk_upload_server::config::UploadConfig;
use chunk_upload_server::infrastructure::storage;
use chunk_upload_server::{AppState, create_app};
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about = "Resumable chunked upload server")]
struct Args {
    /// Port to listen on, overrides SERVER_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Root directory for uploads, overrides UPLOAD_DIR
    #[arg(short, long)]
    upload_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chunk_upload_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting chunk upload server...");

    let mut config = UploadConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(upload_dir) = args.upload_dir {
        config.upload_dir = upload_dir;
    }

    let max_size = if config.max_file_size == 0 {
        "unlimited".to_string()
    } else {
        format!("{} bytes", config.max_file_size)
    };
    info!(
        "🛡️  Upload Config: Max Size={}, Field={}, Public Dir={}",
        max_size,
        config.file_input_name,
        config.public_dir.display()
    );

    let upload_service = storage::setup_storage(&config).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let app = create_app(AppState {
        upload_service,
        config,
    });

    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
