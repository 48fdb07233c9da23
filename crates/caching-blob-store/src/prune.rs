//! The eviction pass

use crate::disk;
use crate::types::CacheLimits;
use blob_store::BlobStore;
use chrono::{DateTime, Utc};
use file_blob_store::FileBlobStore;
use tracing::{debug, warn};

/// Bytes an eviction pass must purge. The size cap takes precedence; the
/// free-space rule only applies once free space has dropped to the
/// configured minimum.
fn purge_target(total_size: u64, device_free: Option<u64>, limits: &CacheLimits) -> u64 {
    if total_size > limits.max_cache_size {
        return total_size - limits.max_cache_size;
    }
    if let Some(free) = device_free {
        if free <= limits.min_device_free {
            return limits.target_device_free.saturating_sub(free);
        }
    }
    0
}

/// Run one eviction pass over `cache`.
///
/// Candidates are deleted stalest-first; two blobs with the same
/// last-access stamp are broken larger-first, freeing more space per
/// eviction. Blobs that were never stamped count as freshly accessed.
/// Eviction is best-effort housekeeping: a filesystem error logs a
/// warning and abandons the pass rather than surfacing to any caller.
pub(crate) async fn prune_cache(cache: &FileBlobStore, limits: &CacheLimits) {
    let entries = match cache.entries().await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "could not enumerate cache, skipping eviction pass");
            return;
        }
    };

    let total_size: u64 = entries.iter().map(|e| e.size).sum();
    let device_free = match disk::available_space(cache.root()) {
        Ok(free) => Some(free),
        Err(e) => {
            debug!(error = %e, "free-space probe unavailable");
            None
        }
    };

    let target = purge_target(total_size, device_free, limits);
    if target == 0 {
        return;
    }

    let now = Utc::now();
    let mut candidates: Vec<(DateTime<Utc>, u64, String)> = entries
        .into_iter()
        .map(|e| (e.last_access.unwrap_or(now), e.size, e.id))
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut purged: u64 = 0;
    for (_, size, id) in candidates {
        if purged >= target {
            break;
        }
        match cache.delete(&id).await {
            Ok(()) => {
                purged += size;
                debug!(id = %id, size, "evicted cached blob");
            }
            Err(e) if e.is_not_found() => continue,
            Err(e) => {
                warn!(id = %id, error = %e, purged, target, "eviction pass aborted");
                return;
            }
        }
    }

    debug!(purged, target, "eviction pass complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use blob_store::BlobStore;
    use chrono::TimeZone;
    use std::path::Path;
    use tempfile::tempdir;

    fn limits(max_cache_size: u64) -> CacheLimits {
        CacheLimits {
            max_cache_size,
            // Keep the free-space rule inert for these tests
            min_device_free: 0,
            target_device_free: 0,
            prune_interval: None,
        }
    }

    #[test]
    fn test_purge_target_over_size_cap() {
        assert_eq!(purge_target(150, Some(u64::MAX), &limits(100)), 50);
    }

    #[test]
    fn test_purge_target_under_size_cap() {
        assert_eq!(purge_target(80, Some(u64::MAX), &limits(100)), 0);
    }

    #[test]
    fn test_purge_target_free_space_pressure() {
        let l = CacheLimits {
            max_cache_size: 1000,
            min_device_free: 100,
            target_device_free: 300,
            prune_interval: None,
        };
        // Free space at the minimum: purge up to the target
        assert_eq!(purge_target(500, Some(100), &l), 200);
        // Plenty of free space: nothing to do
        assert_eq!(purge_target(500, Some(400), &l), 0);
        // No probe available: no free-space pressure assumed
        assert_eq!(purge_target(500, None, &l), 0);
    }

    #[test]
    fn test_size_cap_takes_precedence_over_free_space() {
        let l = CacheLimits {
            max_cache_size: 100,
            min_device_free: 1000,
            target_device_free: 2000,
            prune_interval: None,
        };
        assert_eq!(purge_target(130, Some(500), &l), 30);
    }

    async fn seeded_store(dir: &Path, blobs: &[(&str, usize, i64)]) -> FileBlobStore {
        let store = FileBlobStore::new(dir.to_path_buf());
        store.init().await.unwrap();
        for (id, size, accessed_at) in blobs {
            store
                .store_bytes(id, vec![0u8; *size], "f.bin", "application/octet-stream")
                .await
                .unwrap();
            let stamp = Utc.timestamp_opt(*accessed_at, 0).unwrap();
            store.set_last_access(id, stamp).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_prune_keeps_most_recently_accessed() {
        let dir = tempdir().unwrap();
        // Four 100-byte blobs with increasing access times, 250-byte cap:
        // the two stalest must go.
        let store = seeded_store(
            dir.path(),
            &[("a", 100, 10), ("b", 100, 20), ("c", 100, 30), ("d", 100, 40)],
        )
        .await;

        prune_cache(&store, &limits(250)).await;

        let mut ids = store.list().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["c".to_string(), "d".to_string()]);
    }

    #[tokio::test]
    async fn test_prune_preserves_touched_blob_over_larger_untouched() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path(), &[("small", 10, 10), ("big", 200, 20)]).await;

        // Touch the small blob so it is now the freshest
        store
            .set_last_access("small", Utc.timestamp_opt(100, 0).unwrap())
            .await
            .unwrap();

        prune_cache(&store, &limits(50)).await;

        let ids = store.list().await.unwrap();
        assert_eq!(ids, vec!["small".to_string()]);
    }

    #[tokio::test]
    async fn test_prune_tie_break_evicts_larger_first() {
        let dir = tempdir().unwrap();
        // Same stamp, different sizes, need to purge 50 bytes: the larger
        // one alone satisfies the target.
        let store = seeded_store(dir.path(), &[("lean", 40, 10), ("bulky", 120, 10)]).await;

        prune_cache(&store, &limits(110)).await;

        let ids = store.list().await.unwrap();
        assert_eq!(ids, vec!["lean".to_string()]);
    }

    #[tokio::test]
    async fn test_prune_under_cap_is_noop() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path(), &[("a", 10, 10), ("b", 10, 20)]).await;

        prune_cache(&store, &limits(1000)).await;

        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_prune_treats_unstamped_blob_as_fresh() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path(), &[("stale", 100, 10)]).await;
        // A blob that has never been read carries no stamp
        store
            .store_bytes("unstamped", vec![0u8; 100], "u.bin", "application/octet-stream")
            .await
            .unwrap();

        prune_cache(&store, &limits(150)).await;

        let ids = store.list().await.unwrap();
        assert_eq!(ids, vec!["unstamped".to_string()]);
    }
}
