//! Core blob types

use serde::{Deserialize, Serialize};

/// Metadata carried alongside a blob's payload.
///
/// Locally this is derived from the data file's length plus its sidecar
/// record; remotely it is parsed from `File-Length`/`Content-Length`,
/// `Content-Type`, and `Content-Disposition` response headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    /// Payload size in bytes
    pub size: u64,
    /// Original user-facing filename
    pub filename: String,
    /// Content type, e.g. `application/pdf`
    pub mime_type: String,
}
