//! Response-header parsing for the remote blob protocol

use blob_store::{BlobMetadata, Result, StoreError};
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};

/// Header carrying the payload size; `Content-Length` is the fallback.
pub(crate) const FILE_LENGTH: &str = "File-Length";

/// Parse blob metadata out of a `HEAD`/`GET` response.
///
/// Every required header missing or garbled is a protocol failure, not a
/// not-found: the remote answered, just not in the agreed shape.
pub(crate) fn parse_blob_headers(headers: &HeaderMap) -> Result<BlobMetadata> {
    let size = headers
        .get(FILE_LENGTH)
        .or_else(|| headers.get(CONTENT_LENGTH))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| StoreError::Protocol("missing or invalid length header".to_string()))?;

    let mime_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .ok_or_else(|| StoreError::Protocol("missing Content-Type header".to_string()))?;

    let filename = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(disposition_filename)
        .ok_or_else(|| {
            StoreError::Protocol("missing or invalid Content-Disposition filename".to_string())
        })?;

    Ok(BlobMetadata {
        size,
        filename,
        mime_type,
    })
}

/// Extract the `filename="…"` parameter from a `Content-Disposition` value.
fn disposition_filename(value: &str) -> Option<String> {
    let rest = value.split_once("filename=")?.1;
    let name = if let Some(quoted) = rest.strip_prefix('"') {
        quoted.split_once('"')?.0
    } else {
        rest.split(';').next()?.trim()
    };
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
