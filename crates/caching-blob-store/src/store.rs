//! The caching store wrapper

use crate::prune::prune_cache;
use crate::types::CacheLimits;
use async_trait::async_trait;
use blob_store::{BlobMetadata, BlobStore, Result};
use chrono::Utc;
use file_blob_store::FileBlobStore;
use http_blob_store::HttpBlobStore;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A remote store with a local read cache.
///
/// Writes go to the network only. Reads come from the cache when the blob
/// is present (stamping last-access) and are downloaded into the cache
/// otherwise. Deletion only ever removes the cached copy — the remote
/// protocol has no delete.
pub struct CachingBlobStore {
    remote: HttpBlobStore,
    cache: FileBlobStore,
    limits: CacheLimits,
    prune_timer: Mutex<Option<JoinHandle<()>>>,
}

impl CachingBlobStore {
    /// Open a caching store over `remote` with its cache rooted at
    /// `cache_dir`. Starts the periodic prune timer when
    /// `limits.prune_interval` is set.
    pub async fn open(
        remote: HttpBlobStore,
        cache_dir: PathBuf,
        limits: CacheLimits,
    ) -> Result<Self> {
        let cache = FileBlobStore::new(cache_dir);
        cache.init().await?;

        let prune_timer = limits.prune_interval.map(|period| {
            let cache = cache.clone();
            let limits = limits.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await; // the first tick fires immediately
                loop {
                    ticker.tick().await;
                    prune_cache(&cache, &limits).await;
                }
            })
        });

        Ok(Self {
            remote,
            cache,
            limits,
            prune_timer: Mutex::new(prune_timer),
        })
    }

    /// Canonical cache location for a blob.
    pub fn cache_path_for(&self, id: &str) -> PathBuf {
        self.cache.path_for(id)
    }

    /// Take ownership of an already-uploaded payload file by renaming it
    /// into the cache, then stamp it and run an eviction pass.
    ///
    /// The rename requires `source` to live on the same filesystem as the
    /// cache directory; it replaces any previous cached copy atomically
    /// and avoids both double disk usage and a redundant download.
    pub async fn adopt_file(
        &self,
        id: &str,
        source: &Path,
        filename: &str,
        mime_type: &str,
    ) -> Result<()> {
        let dest = self.cache.path_for(id);
        fs::rename(source, &dest).await?;
        self.cache
            .attach_metadata(id, filename, mime_type, Some(Utc::now()))
            .await?;
        debug!(id = %id, dest = ?dest, "adopted uploaded blob into cache");
        prune_cache(&self.cache, &self.limits).await;
        Ok(())
    }

    /// Run an eviction pass now, outside the timer.
    pub async fn prune_now(&self) {
        prune_cache(&self.cache, &self.limits).await;
    }

    async fn stamp(&self, id: &str) {
        if let Err(e) = self.cache.set_last_access(id, Utc::now()).await {
            warn!(id = %id, error = %e, "could not stamp last access");
        }
    }

    /// Make sure the blob is present in the cache, downloading it if
    /// needed. Returns the cache path and whether a download happened;
    /// the caller decides when to run the post-download eviction pass.
    async fn ensure_cached(&self, id: &str) -> Result<Option<(PathBuf, bool)>> {
        if let Some(path) = self.cache.fetch_path(id).await? {
            self.stamp(id).await;
            return Ok(Some((path, false)));
        }

        let dest = self.cache.path_for(id);
        match self.remote.fetch_to_file(id, &dest).await? {
            Some(meta) => {
                self.cache
                    .attach_metadata(id, &meta.filename, &meta.mime_type, Some(Utc::now()))
                    .await?;
                debug!(id = %id, size = meta.size, "cached blob from remote");
                Ok(Some((dest, true)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BlobStore for CachingBlobStore {
    /// Network only; the cache is never populated by a write.
    async fn store_bytes(
        &self,
        id: &str,
        data: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<()> {
        self.remote.store_bytes(id, data, filename, mime_type).await
    }

    async fn store_file(
        &self,
        id: &str,
        source: &Path,
        filename: &str,
        mime_type: &str,
    ) -> Result<()> {
        self.remote.store_file(id, source, filename, mime_type).await
    }

    async fn fetch_data(&self, id: &str) -> Result<Option<Vec<u8>>> {
        match self.ensure_cached(id).await? {
            Some((path, downloaded)) => {
                let data = fs::read(&path).await?;
                if downloaded {
                    prune_cache(&self.cache, &self.limits).await;
                }
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    async fn fetch_data_now(&self, id: &str) -> Result<Option<Vec<u8>>> {
        match self.cache.fetch_data(id).await? {
            Some(data) => {
                self.stamp(id).await;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    async fn fetch_path(&self, id: &str) -> Result<Option<PathBuf>> {
        match self.ensure_cached(id).await? {
            Some((path, downloaded)) => {
                if downloaded {
                    prune_cache(&self.cache, &self.limits).await;
                }
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }

    async fn fetch_path_now(&self, id: &str) -> Result<Option<PathBuf>> {
        match self.cache.fetch_path(id).await? {
            Some(path) => {
                self.stamp(id).await;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }

    async fn metadata(&self, id: &str) -> Result<Option<BlobMetadata>> {
        if let Some(meta) = self.cache.metadata(id).await? {
            return Ok(Some(meta));
        }
        self.remote.metadata(id).await
    }

    async fn metadata_now(&self, id: &str) -> Result<Option<BlobMetadata>> {
        self.cache.metadata(id).await
    }

    /// Removes the local cached copy only.
    async fn delete(&self, id: &str) -> Result<()> {
        self.cache.delete(id).await
    }

    async fn shut_down(&self, immediately: bool) {
        if let Some(timer) = self.prune_timer.lock().await.take() {
            timer.abort();
        }
        self.remote.shut_down(immediately).await;
        self.cache.shut_down(immediately).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::{Path as AxumPath, State};
    use axum::http::{header, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use blob_store::StoreError;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;
    use url::Url;

    #[derive(Clone, Default)]
    struct TestState {
        blobs: Arc<HashMap<String, (Vec<u8>, String, String)>>,
        downloads: Arc<AtomicUsize>,
    }

    async fn serve_blob(
        State(state): State<TestState>,
        AxumPath(id): AxumPath<String>,
    ) -> Response {
        match state.blobs.get(&id) {
            Some((data, filename, mime)) => {
                state.downloads.fetch_add(1, Ordering::SeqCst);
                Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, mime)
                    .header("File-Length", data.len().to_string())
                    .header(
                        header::CONTENT_DISPOSITION,
                        format!("form-data; filename=\"{}\"", filename),
                    )
                    .body(Body::from(data.clone()))
                    .unwrap()
            }
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn spawn_server(blobs: Vec<(&str, &[u8], &str, &str)>) -> (SocketAddr, TestState) {
        let blobs: HashMap<String, (Vec<u8>, String, String)> = blobs
            .into_iter()
            .map(|(id, data, filename, mime)| {
                (
                    id.to_string(),
                    (data.to_vec(), filename.to_string(), mime.to_string()),
                )
            })
            .collect();
        let state = TestState {
            blobs: Arc::new(blobs),
            downloads: Arc::new(AtomicUsize::new(0)),
        };
        let app = Router::new()
            .route("/blobs/{id}", get(serve_blob))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, state)
    }

    fn no_timer_limits(max_cache_size: u64) -> CacheLimits {
        CacheLimits {
            max_cache_size,
            min_device_free: 0,
            target_device_free: 0,
            prune_interval: None,
        }
    }

    async fn open_store(addr: SocketAddr, cache_dir: PathBuf, limits: CacheLimits) -> CachingBlobStore {
        let base = Url::parse(&format!("http://{}/blobs", addr)).unwrap();
        CachingBlobStore::open(HttpBlobStore::new(base), cache_dir, limits)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_read_through_populates_cache() {
        let (addr, state) = spawn_server(vec![("img", b"pixels", "img.png", "image/png")]).await;
        let dir = tempdir().unwrap();
        let store = open_store(addr, dir.path().to_path_buf(), no_timer_limits(u64::MAX)).await;

        let data = store.fetch_data("img").await.unwrap().unwrap();
        assert_eq!(data, b"pixels");
        assert_eq!(state.downloads.load(Ordering::SeqCst), 1);

        // Second read is served from the cache, not the network
        let data = store.fetch_data("img").await.unwrap().unwrap();
        assert_eq!(data, b"pixels");
        assert_eq!(state.downloads.load(Ordering::SeqCst), 1);

        // The cached copy carries the metadata parsed from the headers
        let meta = store.metadata_now("img").await.unwrap().unwrap();
        assert_eq!(meta.filename, "img.png");
        assert_eq!(meta.mime_type, "image/png");
        assert_eq!(meta.size, 6);
    }

    #[tokio::test]
    async fn test_local_read_never_downloads() {
        let (addr, state) = spawn_server(vec![("doc", b"data", "d.txt", "text/plain")]).await;
        let dir = tempdir().unwrap();
        let store = open_store(addr, dir.path().to_path_buf(), no_timer_limits(u64::MAX)).await;

        assert!(store.fetch_data_now("doc").await.unwrap().is_none());
        assert!(store.fetch_path_now("doc").await.unwrap().is_none());
        assert_eq!(state.downloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_blob_is_none() {
        let (addr, _state) = spawn_server(vec![]).await;
        let dir = tempdir().unwrap();
        let store = open_store(addr, dir.path().to_path_buf(), no_timer_limits(u64::MAX)).await;

        assert!(store.fetch_data("ghost").await.unwrap().is_none());
        assert!(store.metadata("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_cached_copy_and_refetches() {
        let (addr, state) = spawn_server(vec![("v", b"versioned", "v.bin", "application/octet-stream")]).await;
        let dir = tempdir().unwrap();
        let store = open_store(addr, dir.path().to_path_buf(), no_timer_limits(u64::MAX)).await;

        store.fetch_data("v").await.unwrap().unwrap();
        assert_eq!(state.downloads.load(Ordering::SeqCst), 1);

        store.delete("v").await.unwrap();
        assert!(store.fetch_data_now("v").await.unwrap().is_none());

        // The blob still exists remotely; the next read downloads again
        let data = store.fetch_data("v").await.unwrap().unwrap();
        assert_eq!(data, b"versioned");
        assert_eq!(state.downloads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_delete_of_uncached_blob_is_not_found() {
        let (addr, _state) = spawn_server(vec![]).await;
        let dir = tempdir().unwrap();
        let store = open_store(addr, dir.path().to_path_buf(), no_timer_limits(u64::MAX)).await;

        let err = store.delete("never-cached").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_eviction_after_downloads_respects_cap() {
        let payload = vec![0u8; 100];
        let (addr, _state) = spawn_server(vec![
            ("one", &payload, "1.bin", "application/octet-stream"),
            ("two", &payload, "2.bin", "application/octet-stream"),
            ("three", &payload, "3.bin", "application/octet-stream"),
        ])
        .await;
        let dir = tempdir().unwrap();
        let store = open_store(addr, dir.path().to_path_buf(), no_timer_limits(250)).await;

        store.fetch_data("one").await.unwrap().unwrap();
        store.fetch_data("two").await.unwrap().unwrap();
        // Force distinct, ordered stamps regardless of clock resolution
        store
            .cache
            .set_last_access("one", Utc.timestamp_opt(10, 0).unwrap())
            .await
            .unwrap();
        store
            .cache
            .set_last_access("two", Utc.timestamp_opt(20, 0).unwrap())
            .await
            .unwrap();

        store.fetch_data("three").await.unwrap().unwrap();

        // 300 bytes against a 250 cap: the stalest blob is gone
        let mut ids = store.cache.list().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["three".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_adopt_file_moves_payload_into_cache() {
        let (addr, state) = spawn_server(vec![]).await;
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging");
        tokio::fs::create_dir_all(&staging).await.unwrap();
        let cache_dir = dir.path().join("cache");
        let store = open_store(addr, cache_dir, no_timer_limits(u64::MAX)).await;

        let source = staging.join("up-1");
        tokio::fs::write(&source, b"uploaded payload").await.unwrap();

        store
            .adopt_file("up-1", &source, "report.pdf", "application/pdf")
            .await
            .unwrap();

        // Moved, not copied
        assert!(tokio::fs::metadata(&source).await.is_err());

        let data = store.fetch_data_now("up-1").await.unwrap().unwrap();
        assert_eq!(data, b"uploaded payload");
        let meta = store.metadata_now("up-1").await.unwrap().unwrap();
        assert_eq!(meta.filename, "report.pdf");

        // Served locally with no network involved
        assert_eq!(state.downloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shut_down_stops_prune_timer() {
        let (addr, _state) = spawn_server(vec![]).await;
        let dir = tempdir().unwrap();
        let limits = CacheLimits {
            prune_interval: Some(std::time::Duration::from_millis(10)),
            ..CacheLimits::default()
        };
        let store = open_store(addr, dir.path().to_path_buf(), limits).await;

        store.shut_down(true).await;
        assert!(store.prune_timer.lock().await.is_none());
    }
}
