//! Genio Service - HTTP API for credit-metered AI generation
//!
//! This is the main entry point for the genio service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genio_service::{create_router, AppState, ServiceConfig};
use genio_store::{PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,genio=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Genio Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        postgres = %config.database_url.is_some(),
        data_dir = %config.data_dir,
        gemini_configured = %config.gemini_api_key.is_some(),
        huggingface_configured = %config.huggingface_api_key.is_some(),
        cloudinary_configured = %config.cloudinary.is_some(),
        signup_credits = config.signup_credits,
        "Service configuration loaded"
    );

    let store = open_store(&config).await?;

    // Build app state
    let state = AppState::new(store, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Pick the storage backend: PostgreSQL when `DATABASE_URL` is set, otherwise
/// `RocksDB` (or memory when built without it).
async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    if let Some(url) = &config.database_url {
        tracing::info!(
            max_connections = config.database_max_connections,
            "Connecting to PostgreSQL"
        );
        let store = PgStore::connect(url, config.database_max_connections).await?;
        store.migrate().await?;
        return Ok(Arc::new(store));
    }

    #[cfg(feature = "rocksdb-backend")]
    let store: Arc<dyn Store> = {
        tracing::info!(path = %config.data_dir, "Opening RocksDB store");
        Arc::new(genio_store::RocksStore::open(&config.data_dir)?)
    };

    #[cfg(not(feature = "rocksdb-backend"))]
    let store: Arc<dyn Store> = {
        tracing::warn!("No DATABASE_URL and RocksDB disabled - using in-memory store, data will not persist");
        Arc::new(genio_store::MemoryStore::new())
    };

    Ok(store)
}
