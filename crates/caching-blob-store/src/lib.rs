//! Caching wrapper over the remote blob store
//!
//! Reads are satisfied from a local disk cache when possible and
//! downloaded into it otherwise; writes pass straight through to the
//! network and never populate the cache proactively, which keeps the
//! write path a pure network round-trip and lets a composing store
//! relocate an already-uploaded payload with a cheap local rename
//! instead of a redundant download.
//!
//! Cached blobs carry a last-access stamp used solely for eviction
//! ordering; the prune pass runs after every cache-filling download and
//! optionally on a timer.

mod disk;
mod prune;
mod store;
mod types;

pub use store::CachingBlobStore;
pub use types::CacheLimits;
