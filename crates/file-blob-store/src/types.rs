//! Sidecar record and enumeration types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The metadata record persisted beside each data file (`<id>.meta`).
///
/// Kept out-of-band so it survives independently of data-file truncation.
/// `last_access` is only ever stamped on cache-tier blobs and is used
/// solely for eviction ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarRecord {
    pub filename: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access: Option<DateTime<Utc>>,
}

/// One blob as seen by an eviction or replay scan.
#[derive(Debug, Clone)]
pub struct BlobEntry {
    pub id: String,
    pub size: u64,
    /// Missing stamps mean the blob has never been read; eviction treats
    /// it as fresh, not stale.
    pub last_access: Option<DateTime<Utc>>,
}

/// Aggregate numbers for health reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: usize,
    pub total_bytes: u64,
}
