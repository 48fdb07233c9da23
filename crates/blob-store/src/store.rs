//! The `BlobStore` capability trait

use crate::error::Result;
use crate::types::BlobMetadata;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// When a tiered `store` call reports success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorePolicy {
    /// Succeed as soon as the blob is durably persisted locally; the push
    /// to the remote store proceeds in the background and failures surface
    /// on the store's failure channel.
    #[default]
    LocalDurability,
    /// Succeed only once the remote push (and relocation into the cache
    /// tier) has completed. Deterministic, useful in tests.
    RemoteConfirmation,
}

/// The contract every store variant implements.
///
/// Operations come in two forms. The plain form ("always eventually")
/// resolves once the operation completes, transparently falling back to
/// network retrieval where the variant supports it. The `_now` form
/// ("best-effort now") consults local tiers only and never touches the
/// network; a blob that is not instantly available comes back as
/// `Ok(None)`.
///
/// All futures complete on the Tokio runtime that polls them, and each
/// call resolves exactly once — callers may rely on a single consistent
/// completion context. Identifiers are opaque; they double as on-disk
/// filenames and URL path segments, and are not validated for path
/// traversal here.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist a payload under `id`. Fails with
    /// [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists) if
    /// the identifier is occupied — there is no implicit overwrite.
    async fn store_bytes(
        &self,
        id: &str,
        data: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<()>;

    /// Persist the contents of an existing file under `id`. The source
    /// file is left in place.
    async fn store_file(
        &self,
        id: &str,
        source: &Path,
        filename: &str,
        mime_type: &str,
    ) -> Result<()>;

    /// Fetch the payload, falling back to the network where supported.
    async fn fetch_data(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Fetch the payload from local tiers only. Variants with no local
    /// tier fail with `Unsupported` rather than silently degrading.
    async fn fetch_data_now(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Location of the blob's durable local artifact, populating it from
    /// the network where supported.
    async fn fetch_path(&self, id: &str) -> Result<Option<PathBuf>>;

    /// Location of the blob's durable local artifact, local tiers only.
    async fn fetch_path_now(&self, id: &str) -> Result<Option<PathBuf>>;

    /// Metadata for the blob, falling back to the network where supported.
    async fn metadata(&self, id: &str) -> Result<Option<BlobMetadata>>;

    /// Metadata from local tiers only.
    async fn metadata_now(&self, id: &str) -> Result<Option<BlobMetadata>>;

    /// Remove the blob. Fails with `NotFound` if it does not exist.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Release background resources (timers, queued work). With
    /// `immediately` set, outstanding operations are cancelled rather
    /// than allowed to finish; in-flight disk writes are not forcibly
    /// truncated, so callers must tolerate a partial file after an
    /// immediate shutdown mid-store.
    async fn shut_down(&self, immediately: bool);
}
