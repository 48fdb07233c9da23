//! HTTP client for the remote blob protocol

use crate::headers::parse_blob_headers;
use async_trait::async_trait;
use blob_store::{BlobMetadata, BlobStore, Result, StoreError};
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a remote blob endpoint.
///
/// `POST {base}/{id}` stores (multipart form, field `file`), `GET` fetches,
/// `HEAD` reads metadata from headers. The remote protocol has no delete;
/// objects are immutable through this interface once written.
pub struct HttpBlobStore {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpBlobStore {
    /// Create a client with default settings (30 second timeout).
    pub fn new(base_url: Url) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("failed to create HTTP client");
        Self::with_client(base_url, http)
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_client(base_url: Url, http: reqwest::Client) -> Self {
        Self { base_url, http }
    }

    fn url_for(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            urlencoding::encode(id)
        )
    }

    /// Download a blob straight to `dest`, returning the metadata parsed
    /// from the response headers.
    ///
    /// The body is streamed into `<dest>.part` and renamed into place on
    /// completion, so a partially-downloaded blob is never observable at
    /// the final path.
    pub async fn fetch_to_file(&self, id: &str, dest: &Path) -> Result<Option<BlobMetadata>> {
        let url = self.url_for(id);
        let response = self.http.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Protocol(format!(
                "fetch of {} returned status {}",
                id,
                response.status()
            )));
        }

        let meta = parse_blob_headers(response.headers())?;

        let file_name = dest
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::Protocol(format!("invalid destination path for {}", id)))?;
        let partial = dest.with_file_name(format!("{}.part", file_name));

        let mut file = fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = fs::remove_file(&partial).await;
                    return Err(e.into());
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&partial).await;
                return Err(e.into());
            }
        }
        file.sync_all().await?;
        drop(file);
        fs::rename(&partial, dest).await?;

        debug!(id = %id, size = meta.size, dest = ?dest, "downloaded blob");
        Ok(Some(meta))
    }

    async fn upload(&self, id: &str, data: Vec<u8>, filename: &str, mime_type: &str) -> Result<()> {
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime_type)?;
        let form = Form::new().part("file", part);

        let url = self.url_for(id);
        let response = self.http.post(&url).multipart(form).send().await?;

        match response.status() {
            status if status.is_success() => {
                debug!(id = %id, "uploaded blob");
                Ok(())
            }
            StatusCode::CONFLICT => Err(StoreError::AlreadyExists(id.to_string())),
            status => {
                warn!(id = %id, status = %status, "upload rejected");
                Err(StoreError::Protocol(format!(
                    "upload of {} returned status {}",
                    id, status
                )))
            }
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn store_bytes(
        &self,
        id: &str,
        data: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<()> {
        self.upload(id, data, filename, mime_type).await
    }

    async fn store_file(
        &self,
        id: &str,
        source: &Path,
        filename: &str,
        mime_type: &str,
    ) -> Result<()> {
        let data = fs::read(source).await?;
        self.upload(id, data, filename, mime_type).await
    }

    async fn fetch_data(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let url = self.url_for(id);
        let response = self.http.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Protocol(format!(
                "fetch of {} returned status {}",
                id,
                response.status()
            )));
        }

        Ok(Some(response.bytes().await?.to_vec()))
    }

    /// Cacheless: there is nothing to return "now". Calling this is a
    /// contract violation on the remote store.
    async fn fetch_data_now(&self, _id: &str) -> Result<Option<Vec<u8>>> {
        Err(StoreError::Unsupported(
            "local fetch on a remote store with no local tier",
        ))
    }

    /// No durable local artifact can exist for a remote blob.
    async fn fetch_path(&self, _id: &str) -> Result<Option<PathBuf>> {
        Err(StoreError::Unsupported(
            "local path of a blob on a remote store",
        ))
    }

    async fn fetch_path_now(&self, _id: &str) -> Result<Option<PathBuf>> {
        Err(StoreError::Unsupported(
            "local path of a blob on a remote store",
        ))
    }

    async fn metadata(&self, id: &str) -> Result<Option<BlobMetadata>> {
        let url = self.url_for(id);
        let response = self.http.head(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Protocol(format!(
                "metadata of {} returned status {}",
                id,
                response.status()
            )));
        }

        parse_blob_headers(response.headers()).map(Some)
    }

    async fn metadata_now(&self, _id: &str) -> Result<Option<BlobMetadata>> {
        Err(StoreError::Unsupported(
            "local metadata on a remote store with no local tier",
        ))
    }

    /// The remote protocol offers no delete; this is a fixed limitation,
    /// not a recoverable condition.
    async fn delete(&self, _id: &str) -> Result<()> {
        Err(StoreError::Unsupported("delete on a remote store"))
    }

    /// Stateless client; in-flight requests are cancelled when their
    /// futures are dropped by the caller.
    async fn shut_down(&self, _immediately: bool) {}
}
