//! Background upload queue

use crate::types::UploadFailure;
use blob_store::{BlobStore, Result};
use caching_blob_store::CachingBlobStore;
use file_blob_store::FileBlobStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// Drives deferred pushes from the outbox to the remote store.
///
/// The pending map is the upload-pending set: one live entry per
/// identifier, so two near-simultaneous stores for the same blob result
/// in exactly one network upload.
pub(crate) struct Uploader {
    outbox: FileBlobStore,
    cache: Arc<CachingBlobStore>,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
    failures: broadcast::Sender<UploadFailure>,
}

impl Uploader {
    pub(crate) fn new(outbox: FileBlobStore, cache: Arc<CachingBlobStore>) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            outbox,
            cache,
            pending: Mutex::new(HashMap::new()),
            failures,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<UploadFailure> {
        self.failures.subscribe()
    }

    /// True while an upload for `id` is queued or in flight.
    pub(crate) async fn is_pending(&self, id: &str) -> bool {
        self.pending
            .lock()
            .await
            .get(id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start a background upload for `id` unless one is already in
    /// flight. Failures are reported on the failure channel.
    pub(crate) async fn ensure_upload(self: &Arc<Self>, id: &str) {
        self.spawn_push(id, None).await;
    }

    /// Upload `id` and wait for the outcome. A shutdown that aborts the
    /// push mid-flight resolves as "not completed, no error".
    pub(crate) async fn push_and_confirm(self: &Arc<Self>, id: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if !self.spawn_push(id, Some(tx)).await {
            // An earlier push is in flight; its outcome stands.
            return Ok(());
        }
        match rx.await {
            Ok(result) => result,
            Err(_) => Ok(()), // deliberately aborted
        }
    }

    /// Abandon any pending upload for `id` (used when the blob is being
    /// deleted out from under it).
    pub(crate) async fn cancel(&self, id: &str) {
        if let Some(handle) = self.pending.lock().await.remove(id) {
            handle.abort();
        }
    }

    /// Abort (immediate) or drain (graceful) every pending upload.
    pub(crate) async fn shut_down(&self, immediately: bool) {
        let handles: Vec<JoinHandle<()>> =
            self.pending.lock().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            if immediately {
                handle.abort();
            } else {
                let _ = handle.await;
            }
        }
    }

    async fn spawn_push(
        self: &Arc<Self>,
        id: &str,
        confirm: Option<oneshot::Sender<Result<()>>>,
    ) -> bool {
        let mut pending = self.pending.lock().await;
        if let Some(handle) = pending.get(id) {
            if !handle.is_finished() {
                return false;
            }
        }

        let this = Arc::clone(self);
        let id_owned = id.to_string();
        let handle = tokio::spawn(async move {
            let result = push(&this.outbox, &this.cache, &id_owned).await;
            match (confirm, result) {
                (Some(tx), result) => {
                    let _ = tx.send(result);
                }
                (None, Ok(())) => {}
                (None, Err(e)) => {
                    warn!(id = %id_owned, error = %e, "background upload failed, blob stays queued");
                    let _ = this.failures.send(UploadFailure {
                        id: id_owned.clone(),
                        error: e.to_string(),
                    });
                }
            }
            this.pending.lock().await.remove(&id_owned);
        });
        pending.insert(id.to_string(), handle);
        true
    }
}

/// Push one outbox blob to the remote store, then relocate its payload
/// into the cache tier by rename — same identifier, metadata preserved,
/// no second copy on disk and no redundant download.
async fn push(outbox: &FileBlobStore, cache: &CachingBlobStore, id: &str) -> Result<()> {
    let Some(meta) = outbox.metadata(id).await? else {
        // Deleted or already relocated since this push was queued
        debug!(id = %id, "nothing left to push");
        return Ok(());
    };

    let path = outbox.path_for(id);
    cache
        .store_file(id, &path, &meta.filename, &meta.mime_type)
        .await?;
    cache
        .adopt_file(id, &path, &meta.filename, &meta.mime_type)
        .await?;
    outbox.remove_metadata(id).await?;

    debug!(id = %id, size = meta.size, "pushed blob to remote and relocated into cache");
    Ok(())
}
