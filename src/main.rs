mod config;
mod db;
mod error;
mod handlers;
mod imaging;
mod models;
mod services;
mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::imaging::{DicomParser, DicomRsParser};
use crate::storage::{BlobStore, LocalStorage};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub store: Arc<dyn BlobStore>,
    pub parser: Arc<dyn DicomParser>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dicom_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DICOM service...");

    // Load configuration
    let config = Arc::new(Config::load()?);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    let store: Arc<dyn BlobStore> = Arc::new(LocalStorage::new(&config.storage));
    tracing::info!(
        "Blob store: {} at {}",
        store.storage_type(),
        config.storage.local_path
    );

    // Create app state
    let state = AppState {
        db,
        config: config.clone(),
        store,
        parser: Arc::new(DicomRsParser::new()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    // Rendered frames are shown by browser front ends on other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes());

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/files",
            get(handlers::file::list_files).post(handlers::file::upload_file),
        )
        .route("/files/:id/header", get(handlers::file::get_header))
        .route("/files/:id/image", get(handlers::file::get_image))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
