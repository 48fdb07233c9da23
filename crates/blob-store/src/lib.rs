//! Blob store capability interface
//!
//! Defines the contract shared by every store variant: durable local
//! storage, the network-backed remote store, the caching wrapper, and the
//! tiered store that composes them. Variants are composed by delegation —
//! a wrapper holds the store it extends rather than subclassing it.

pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::{BlobStore, StorePolicy};
pub use types::BlobMetadata;
