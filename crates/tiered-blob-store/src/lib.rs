//! Unified tiered blob store
//!
//! Composes a private outbox (a durable write-ahead directory) with a
//! caching remote store. Writes land locally and durably before anything
//! touches the network, then a background task pushes them to the remote
//! store and relocates the payload into the cache tier with a local
//! rename. Reads are satisfied by whichever tier currently holds the
//! blob: outbox first, then cache, then network.
//!
//! At most one upload is ever in flight per identifier. Uploads that fail
//! after the caller was already told the local write succeeded are
//! reported on a subscribable failure channel, and the blob stays queued
//! for retry.

mod store;
mod types;
mod uploader;

pub use store::TieredBlobStore;
pub use types::UploadFailure;
