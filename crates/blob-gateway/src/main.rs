//! Blob gateway - the server side of the remote blob protocol
//!
//! Accepts multipart blob uploads and serves them back with their
//! metadata headers, backed by a disk store.

mod error;
mod server;
mod types;

use crate::error::{GatewayError, Result};
use crate::server::{start_server, ServerState, SharedState};
use crate::types::GatewayConfig;
use file_blob_store::FileBlobStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("blob_gateway=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting blob gateway...");

    // Load configuration from environment
    let config = load_config()?;
    info!("Port: {}", config.port);
    info!("Data dir: {:?}", config.data_dir);
    info!(
        "Max upload size: {} MB",
        config.max_upload_bytes / (1024 * 1024)
    );

    // Create and initialize the backing store
    let store = FileBlobStore::new(config.data_dir);
    store.init().await?;

    let state: SharedState = Arc::new(ServerState::new(store));

    // Start HTTP server (blocking)
    start_server(state, config.port, config.max_upload_bytes)
        .await
        .map_err(|e| GatewayError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

fn load_config() -> Result<GatewayConfig> {
    let defaults = GatewayConfig::default();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(defaults.port);

    let data_dir = std::env::var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.data_dir);

    let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(defaults.max_upload_bytes);

    Ok(GatewayConfig {
        port,
        data_dir,
        max_upload_bytes,
    })
}
