//! Network-backed blob store
//!
//! A stateless client for the remote blob protocol: multipart `POST` to
//! store, `GET` to fetch, `HEAD` to read metadata from response headers.
//! Nothing is retained locally; the local-only (`_now`) accessors and
//! `delete` are contract violations on this variant and fail loudly.

mod headers;
mod store;

pub use store::HttpBlobStore;
