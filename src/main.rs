mod api;
mod config;
mod rating;
mod storage;

use crate::api::AppState;
use crate::config::{AppConfig, Backend};
use crate::storage::{DateStore, MemoryDateStore, MongoDateStore};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("🚀 Starting Dates API Server");

    // Load configuration
    let config = AppConfig::load()?;
    info!("📋 Configuration loaded");
    info!("   - Backend: {}", config.database.backend);
    info!("   - Database: {}/{}", config.database.name, config.database.collection);
    info!("   - Server: {}", config.listen_addr());

    // Initialize storage
    info!("💾 Initializing date store...");
    let store: Arc<dyn DateStore> = match config.database.backend {
        Backend::Mongo => Arc::new(
            MongoDateStore::connect(
                &config.database.uri,
                &config.database.name,
                &config.database.collection,
            )
            .await?,
        ),
        Backend::Memory => Arc::new(MemoryDateStore::new()),
    };
    info!("✅ Date store ready ({})", store.backend());

    let app = api::router(AppState::new(store)).layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📡 Available endpoints:");
    info!("   GET    /                - Landing page");
    info!("   GET    /health          - Health check");
    info!("   GET    /get-all         - List date entries");
    info!("   GET    /get-one         - Get one date entry (oid)");
    info!("   POST   /add-date        - Add a date entry");
    info!("   PUT    /update-date     - Merge fields into a date entry (oid)");
    info!("   DELETE /delete-date     - Delete a date entry (oid)");
    info!("   PUT    /add-review      - Add a review (oid)");
    info!("   PUT    /update-review   - Replace a review (oid, uid)");
    info!("   DELETE /delete-review   - Delete a review (oid, uid)");
    info!("");
    info!("✨ Server is ready to accept requests!");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutting down gracefully");

    Ok(())
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}
