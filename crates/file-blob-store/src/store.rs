//! Disk persistence for blobs and their sidecar records

use crate::types::{BlobEntry, SidecarRecord, StoreStats};
use async_trait::async_trait;
use blob_store::{BlobMetadata, BlobStore, Result, StoreError};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Suffix for sidecar metadata records.
const META_SUFFIX: &str = ".meta";
/// Suffix for in-progress downloads; never visible as a blob.
const PART_SUFFIX: &str = ".part";

/// A durable, disk-backed blob store.
///
/// One flat directory, one data file per blob named by identifier, one
/// sidecar record per blob. The directory is exclusively owned by this
/// instance; no cross-process coordination is attempted. Cloning is cheap
/// and clones share the same directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Create a store rooted at `root`. Call [`init`](Self::init) before use.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Ensure the root directory exists.
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        debug!(root = ?self.root, "blob store initialized");
        Ok(())
    }

    /// The directory this store owns.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical location of a blob's data file.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn meta_path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}{}", id, META_SUFFIX))
    }

    async fn load_sidecar(&self, id: &str) -> Option<SidecarRecord> {
        let raw = fs::read(self.meta_path_for(id)).await.ok()?;
        match serde_json::from_slice(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(id = %id, error = %e, "unreadable sidecar record, treating blob as absent");
                None
            }
        }
    }

    async fn save_sidecar(&self, id: &str, record: &SidecarRecord) -> Result<()> {
        let raw = serde_json::to_vec(record)
            .map_err(|e| StoreError::Io(Box::new(std::io::Error::new(ErrorKind::InvalidData, e))))?;
        let final_path = self.meta_path_for(id);
        let tmp_path = self.root.join(format!("{}{}{}", id, META_SUFFIX, PART_SUFFIX));
        fs::write(&tmp_path, &raw).await?;
        fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }

    /// Open the data file for exclusive creation. A data file with no
    /// sidecar is a leftover from an interrupted write and is replaced
    /// rather than reported as a duplicate.
    async fn create_exclusive(&self, id: &str) -> Result<fs::File> {
        let path = self.path_for(id);
        for _ in 0..2 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok(file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.load_sidecar(id).await.is_some() {
                        return Err(StoreError::AlreadyExists(id.to_string()));
                    }
                    debug!(id = %id, "replacing orphaned data file");
                    fs::remove_file(&path).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::AlreadyExists(id.to_string()))
    }

    async fn finish_store(&self, id: &str, file: fs::File, filename: &str, mime_type: &str) -> Result<()> {
        if let Err(e) = file.sync_all().await {
            let _ = fs::remove_file(self.path_for(id)).await;
            return Err(e.into());
        }
        drop(file);

        let record = SidecarRecord {
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            last_access: None,
        };
        if let Err(e) = self.save_sidecar(id, &record).await {
            let _ = fs::remove_file(self.path_for(id)).await;
            return Err(e);
        }
        debug!(id = %id, filename = %filename, "stored blob");
        Ok(())
    }

    /// List every identifier currently present, skipping sidecar records
    /// and partial downloads.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(META_SUFFIX) || name.ends_with(PART_SUFFIX) {
                continue;
            }
            ids.push(name.to_string());
        }
        Ok(ids)
    }

    /// Enumerate blobs with the size and last-access stamp an eviction
    /// pass needs.
    pub async fn entries(&self) -> Result<Vec<BlobEntry>> {
        let mut entries = Vec::new();
        for id in self.list().await? {
            let Ok(meta) = fs::metadata(self.path_for(&id)).await else {
                continue;
            };
            let last_access = self.load_sidecar(&id).await.and_then(|r| r.last_access);
            entries.push(BlobEntry {
                id,
                size: meta.len(),
                last_access,
            });
        }
        Ok(entries)
    }

    /// Update the blob's last-access stamp (cache tier only).
    pub async fn set_last_access(&self, id: &str, when: DateTime<Utc>) -> Result<()> {
        let Some(mut record) = self.load_sidecar(id).await else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        record.last_access = Some(when);
        self.save_sidecar(id, &record).await
    }

    /// Write (or overwrite) a blob's sidecar record. Used when a data file
    /// arrives by rename rather than through `store_*`.
    pub async fn attach_metadata(
        &self,
        id: &str,
        filename: &str,
        mime_type: &str,
        last_access: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let record = SidecarRecord {
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            last_access,
        };
        self.save_sidecar(id, &record).await
    }

    /// Remove a blob's sidecar record, tolerating its absence. Used after
    /// a data file has been relocated to another tier.
    pub async fn remove_metadata(&self, id: &str) -> Result<()> {
        match fs::remove_file(self.meta_path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Aggregate entry count and byte total for health reporting.
    pub async fn stats(&self) -> Result<StoreStats> {
        let entries = self.entries().await?;
        Ok(StoreStats {
            entries: entries.len(),
            total_bytes: entries.iter().map(|e| e.size).sum(),
        })
    }

    /// A blob exists only when both its data file and sidecar are present.
    async fn lookup(&self, id: &str) -> Result<Option<(PathBuf, SidecarRecord)>> {
        let path = self.path_for(id);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => match self.load_sidecar(id).await {
                Some(record) => Ok(Some((path, record))),
                None => Ok(None),
            },
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn store_bytes(
        &self,
        id: &str,
        data: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<()> {
        let mut file = self.create_exclusive(id).await?;
        if let Err(e) = file.write_all(&data).await {
            let _ = fs::remove_file(self.path_for(id)).await;
            return Err(e.into());
        }
        self.finish_store(id, file, filename, mime_type).await
    }

    async fn store_file(
        &self,
        id: &str,
        source: &Path,
        filename: &str,
        mime_type: &str,
    ) -> Result<()> {
        let mut src = fs::File::open(source).await?;
        let mut dest = self.create_exclusive(id).await?;
        if let Err(e) = tokio::io::copy(&mut src, &mut dest).await {
            let _ = fs::remove_file(self.path_for(id)).await;
            return Err(e.into());
        }
        self.finish_store(id, dest, filename, mime_type).await
    }

    async fn fetch_data(&self, id: &str) -> Result<Option<Vec<u8>>> {
        match self.lookup(id).await? {
            Some((path, _)) => Ok(Some(fs::read(&path).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_data_now(&self, id: &str) -> Result<Option<Vec<u8>>> {
        self.fetch_data(id).await
    }

    async fn fetch_path(&self, id: &str) -> Result<Option<PathBuf>> {
        Ok(self.lookup(id).await?.map(|(path, _)| path))
    }

    async fn fetch_path_now(&self, id: &str) -> Result<Option<PathBuf>> {
        self.fetch_path(id).await
    }

    async fn metadata(&self, id: &str) -> Result<Option<BlobMetadata>> {
        match self.lookup(id).await? {
            Some((path, record)) => {
                let size = fs::metadata(&path).await?.len();
                Ok(Some(BlobMetadata {
                    size,
                    filename: record.filename,
                    mime_type: record.mime_type,
                }))
            }
            None => Ok(None),
        }
    }

    async fn metadata_now(&self, id: &str) -> Result<Option<BlobMetadata>> {
        self.metadata(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        self.remove_metadata(id).await?;
        debug!(id = %id, "deleted blob");
        Ok(())
    }

    /// No background resources; nothing to release.
    async fn shut_down(&self, _immediately: bool) {}
}
