//! Durable disk-backed blob store
//!
//! Stores one data file per blob inside a flat root directory, named by
//! identifier, with a small JSON sidecar record per blob holding the
//! original filename, MIME type, and (for cache-tier blobs) the
//! last-access timestamp. A data file whose sidecar is missing or
//! unreadable is treated as absent, which self-heals partial writes.

mod store;
mod types;

pub use store::FileBlobStore;
pub use types::{BlobEntry, SidecarRecord, StoreStats};
