//! Core types for the blob gateway

use file_blob_store::StoreStats;
use serde::Serialize;
use std::path::PathBuf;

/// Configuration for the gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 3020,
            data_dir: PathBuf::from("./data/blobs"),
            max_upload_bytes: 32 * 1024 * 1024, // 32MB
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub store: StoreStats,
}
