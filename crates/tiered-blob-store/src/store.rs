//! The unified store facade

use crate::types::UploadFailure;
use crate::uploader::Uploader;
use async_trait::async_trait;
use blob_store::{BlobMetadata, BlobStore, Result, StoreError, StorePolicy};
use caching_blob_store::CachingBlobStore;
use file_blob_store::FileBlobStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// The store callers address.
///
/// Composes a private outbox (write-ahead queue) with a caching remote
/// store. A `store` call persists to the outbox first; the push to the
/// remote store happens in the background unless the
/// [`RemoteConfirmation`](StorePolicy::RemoteConfirmation) policy is
/// selected. Reads try the outbox, then the cache, then the network.
///
/// The outbox and cache directories must live on the same filesystem:
/// a completed upload relocates its payload with a rename.
pub struct TieredBlobStore {
    outbox: FileBlobStore,
    cache: Arc<CachingBlobStore>,
    uploader: Arc<Uploader>,
    policy: StorePolicy,
}

impl TieredBlobStore {
    /// Open the store and replay the outbox: every blob still queued from
    /// an earlier run is eagerly re-enqueued for upload.
    pub async fn open(
        outbox_dir: PathBuf,
        cache: CachingBlobStore,
        policy: StorePolicy,
    ) -> Result<Self> {
        let outbox = FileBlobStore::new(outbox_dir);
        outbox.init().await?;
        let cache = Arc::new(cache);
        let uploader = Arc::new(Uploader::new(outbox.clone(), Arc::clone(&cache)));

        let queued = outbox.list().await?;
        if !queued.is_empty() {
            info!(count = queued.len(), "replaying queued uploads");
        }
        for id in queued {
            uploader.ensure_upload(&id).await;
        }

        Ok(Self {
            outbox,
            cache,
            uploader,
            policy,
        })
    }

    /// Subscribe to deferred-upload failures. Only uploads whose local
    /// write was already acknowledged report here; a push cancelled by
    /// shutdown emits nothing.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<UploadFailure> {
        self.uploader.subscribe()
    }

    async fn after_local_write(&self, id: &str) -> Result<()> {
        match self.policy {
            StorePolicy::LocalDurability => {
                self.uploader.ensure_upload(id).await;
                Ok(())
            }
            StorePolicy::RemoteConfirmation => self.uploader.push_and_confirm(id).await,
        }
    }

    /// Map a per-tier delete outcome to "was the blob there".
    fn tier_presence(result: Result<()>) -> Result<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BlobStore for TieredBlobStore {
    async fn store_bytes(
        &self,
        id: &str,
        data: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<()> {
        // A store for an identifier whose upload is in flight is
        // suppressed: the existing operation's outcome stands.
        if self.uploader.is_pending(id).await {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        match self.outbox.store_bytes(id, data, filename, mime_type).await {
            Ok(()) => {}
            Err(e @ StoreError::AlreadyExists(_)) => {
                // Still queued from an earlier failed push: re-arm it.
                self.uploader.ensure_upload(id).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        }
        self.after_local_write(id).await
    }

    async fn store_file(
        &self,
        id: &str,
        source: &Path,
        filename: &str,
        mime_type: &str,
    ) -> Result<()> {
        if self.uploader.is_pending(id).await {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        match self
            .outbox
            .store_file(id, source, filename, mime_type)
            .await
        {
            Ok(()) => {}
            Err(e @ StoreError::AlreadyExists(_)) => {
                self.uploader.ensure_upload(id).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        }
        self.after_local_write(id).await
    }

    async fn fetch_data(&self, id: &str) -> Result<Option<Vec<u8>>> {
        if let Some(data) = self.outbox.fetch_data(id).await? {
            return Ok(Some(data));
        }
        self.cache.fetch_data(id).await
    }

    async fn fetch_data_now(&self, id: &str) -> Result<Option<Vec<u8>>> {
        if let Some(data) = self.outbox.fetch_data_now(id).await? {
            return Ok(Some(data));
        }
        self.cache.fetch_data_now(id).await
    }

    async fn fetch_path(&self, id: &str) -> Result<Option<PathBuf>> {
        if let Some(path) = self.outbox.fetch_path(id).await? {
            return Ok(Some(path));
        }
        self.cache.fetch_path(id).await
    }

    async fn fetch_path_now(&self, id: &str) -> Result<Option<PathBuf>> {
        if let Some(path) = self.outbox.fetch_path_now(id).await? {
            return Ok(Some(path));
        }
        self.cache.fetch_path_now(id).await
    }

    async fn metadata(&self, id: &str) -> Result<Option<BlobMetadata>> {
        if let Some(meta) = self.outbox.metadata(id).await? {
            return Ok(Some(meta));
        }
        self.cache.metadata(id).await
    }

    async fn metadata_now(&self, id: &str) -> Result<Option<BlobMetadata>> {
        if let Some(meta) = self.outbox.metadata_now(id).await? {
            return Ok(Some(meta));
        }
        self.cache.metadata_now(id).await
    }

    /// Remove the blob from every tier that holds it. Absence in one tier
    /// is tolerated; only a blob present in neither tier is an error.
    async fn delete(&self, id: &str) -> Result<()> {
        self.uploader.cancel(id).await;
        let in_outbox = Self::tier_presence(self.outbox.delete(id).await)?;
        let in_cache = Self::tier_presence(self.cache.delete(id).await)?;
        if in_outbox || in_cache {
            Ok(())
        } else {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    async fn shut_down(&self, immediately: bool) {
        self.uploader.shut_down(immediately).await;
        self.outbox.shut_down(immediately).await;
        self.cache.shut_down(immediately).await;
    }
}
