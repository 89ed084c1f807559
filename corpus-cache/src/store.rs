//! Content-addressed blob store.
//!
//! Blobs live at `<root>/<first two hex chars>/<digest>`. A blob is written
//! to a hidden temp sibling and renamed into place, so two processes putting
//! the same content race harmlessly. Recency for LRU eviction is the blob's
//! mtime, refreshed on every hit and on every repeated put.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use filetime::FileTime;
use serde::Serialize;

use corpus_core::{Digest, Settings};

use crate::error::{io_err, CacheError};

const UNKNOWN_USAGE: u64 = u64::MAX;

/// The operations the sync engine needs from a cache.
pub trait BlobStore {
    /// Store `bytes` if absent and return their digest.
    fn put(&self, bytes: &[u8]) -> Result<Digest, CacheError>;

    /// Bytes whose digest is `digest`, or `None` on a miss.
    fn get(&self, digest: &Digest) -> Result<Option<Vec<u8>>, CacheError>;
}

/// Outcome of an eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    pub removed: usize,
    pub freed_bytes: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct BlobEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// On-disk [`BlobStore`] with a size-bounded LRU policy.
#[derive(Debug)]
pub struct ContentCache {
    root: PathBuf,
    max_bytes: u64,
    usage: AtomicU64,
}

impl ContentCache {
    /// Open a cache rooted at `root`. No I/O happens until first use.
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
            usage: AtomicU64::new(UNKNOWN_USAGE),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.blobs_dir(), settings.cache_max_bytes)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(&digest.as_str()[..2]).join(digest.as_str())
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.blob_path(digest).is_file()
    }

    /// Remove least-recently-used blobs until the total size is at most
    /// `limit_bytes`.
    pub fn evict(&self, limit_bytes: u64) -> Result<EvictionReport, CacheError> {
        self.evict_except(limit_bytes, None)
    }

    /// Remove every blob. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let entries = self.entries()?;
        let count = entries.len();
        for entry in entries {
            remove_blob(&entry.path)?;
        }
        self.usage.store(0, Ordering::Relaxed);
        tracing::info!(root = %self.root.display(), removed = count, "cache cleared");
        Ok(count)
    }

    fn evict_except(
        &self,
        limit_bytes: u64,
        keep: Option<&Path>,
    ) -> Result<EvictionReport, CacheError> {
        let mut entries = self.entries()?;
        let mut total: u64 = entries.iter().map(|e| e.size).sum();
        entries.sort_by(|a, b| a.modified.cmp(&b.modified).then(a.path.cmp(&b.path)));

        let mut report = EvictionReport::default();
        for entry in entries {
            if total <= limit_bytes {
                break;
            }
            if keep == Some(entry.path.as_path()) {
                continue;
            }
            remove_blob(&entry.path)?;
            total = total.saturating_sub(entry.size);
            report.removed += 1;
            report.freed_bytes += entry.size;
            tracing::debug!(path = %entry.path.display(), size = entry.size, "evicted blob");
        }

        self.usage.store(total, Ordering::Relaxed);
        if report.removed > 0 {
            tracing::info!(
                removed = report.removed,
                freed_bytes = report.freed_bytes,
                "cache eviction"
            );
        }
        Ok(report)
    }

    /// Every committed blob (temp files excluded). Missing root → empty.
    pub(crate) fn entries(&self) -> Result<Vec<BlobEntry>, CacheError> {
        let mut entries = Vec::new();
        for shard in read_dir_or_empty(&self.root)? {
            if !shard.is_dir() {
                continue;
            }
            for path in read_dir_or_empty(&shard)? {
                if is_temp_name(&path) || !path.is_file() {
                    continue;
                }
                let meta = match fs::metadata(&path) {
                    Ok(meta) => meta,
                    // Removed by a concurrent eviction.
                    Err(err) if err.kind() == ErrorKind::NotFound => continue,
                    Err(err) => return Err(io_err("stat", &path, err)),
                };
                entries.push(BlobEntry {
                    size: meta.len(),
                    modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    path,
                });
            }
        }
        Ok(entries)
    }

    /// Temp files left behind by interrupted writers.
    pub(crate) fn stray_temp_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut stray = Vec::new();
        for shard in read_dir_or_empty(&self.root)? {
            if shard.is_dir() {
                stray.extend(read_dir_or_empty(&shard)?.into_iter().filter(|p| is_temp_name(p)));
            }
        }
        Ok(stray)
    }

    pub(crate) fn usage_bytes(&self) -> Result<u64, CacheError> {
        let cached = self.usage.load(Ordering::Relaxed);
        if cached != UNKNOWN_USAGE {
            return Ok(cached);
        }
        let total = self.entries()?.iter().map(|e| e.size).sum();
        self.usage.store(total, Ordering::Relaxed);
        Ok(total)
    }

    fn record_usage(&self, path: &Path, total: u64) -> Result<(), CacheError> {
        self.usage.store(total, Ordering::Relaxed);
        if total > self.max_bytes {
            self.evict_except(self.max_bytes, Some(path))?;
        }
        Ok(())
    }
}

impl BlobStore for ContentCache {
    fn put(&self, bytes: &[u8]) -> Result<Digest, CacheError> {
        let digest = Digest::of(bytes);
        let path = self.blob_path(&digest);

        let mut replaced = 0;
        if let Ok(meta) = fs::metadata(&path) {
            if meta.len() == bytes.len() as u64 {
                touch(&path);
                return Ok(digest);
            }
            tracing::debug!(path = %path.display(), "replacing truncated blob");
            // The tracked total predates the truncation; re-measure it.
            self.usage.store(UNKNOWN_USAGE, Ordering::Relaxed);
            replaced = meta.len();
        }
        // Measured before the write so the new blob is counted exactly once.
        let before = self.usage_bytes()?.saturating_sub(replaced);

        let Some(dir) = path.parent() else {
            return Err(io_err(
                "put",
                &path,
                std::io::Error::other("blob path has no parent"),
            ));
        };
        fs::create_dir_all(dir).map_err(|e| io_err("create shard", dir, e))?;

        let tmp = dir.join(format!(
            ".{}.{}.{}.tmp",
            digest.as_str(),
            std::process::id(),
            unique_suffix()
        ));
        fs::write(&tmp, bytes).map_err(|e| io_err("write", &tmp, e))?;
        if let Err(err) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err("rename", &path, err));
        }

        tracing::debug!(digest = %digest.short(), size = bytes.len(), "stored blob");
        self.record_usage(&path, before.saturating_add(bytes.len() as u64))?;
        Ok(digest)
    }

    fn get(&self, digest: &Digest) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.blob_path(digest);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_err("read", &path, err)),
        };

        if Digest::of(&bytes) != *digest {
            tracing::debug!(path = %path.display(), "discarding corrupt blob");
            let _ = fs::remove_file(&path);
            self.usage.store(UNKNOWN_USAGE, Ordering::Relaxed);
            return Ok(None);
        }

        touch(&path);
        Ok(Some(bytes))
    }
}

fn touch(path: &Path) {
    if let Err(err) = filetime::set_file_mtime(path, FileTime::now()) {
        tracing::debug!(path = %path.display(), error = %err, "could not refresh blob recency");
    }
}

fn remove_blob(path: &Path) -> Result<(), CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err("remove", path, err)),
    }
}

fn read_dir_or_empty(dir: &Path) -> Result<Vec<PathBuf>, CacheError> {
    let iter = match fs::read_dir(dir) {
        Ok(iter) => iter,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_err("list", dir, err)),
    };
    let mut paths: Vec<PathBuf> = iter.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();
    Ok(paths)
}

fn is_temp_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn cache(dir: &TempDir, max_bytes: u64) -> ContentCache {
        ContentCache::new(dir.path().join("blobs"), max_bytes)
    }

    fn age(path: &Path, secs_ago: u64) {
        let when = SystemTime::now() - Duration::from_secs(secs_ago);
        filetime::set_file_mtime(path, FileTime::from_system_time(when)).unwrap();
    }

    #[test]
    fn put_then_get_returns_same_bytes() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 1024);
        let digest = cache.put(b"hello corpus").unwrap();
        assert_eq!(digest, Digest::of(b"hello corpus"));
        assert_eq!(cache.get(&digest).unwrap().as_deref(), Some(&b"hello corpus"[..]));
    }

    #[test]
    fn get_unknown_digest_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 1024);
        assert!(cache.get(&Digest::of(b"never stored")).unwrap().is_none());
    }

    #[test]
    fn put_is_idempotent_and_stores_once() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 1024);
        let first = cache.put(b"same").unwrap();
        let second = cache.put(b"same").unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.entries().unwrap().len(), 1);
        assert!(cache.stray_temp_files().unwrap().is_empty());
    }

    #[test]
    fn blob_is_sharded_by_digest_prefix() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 1024);
        let digest = cache.put(b"x").unwrap();
        let path = cache.blob_path(&digest);
        assert!(path.is_file());
        assert_eq!(
            path.parent().unwrap().file_name().unwrap().to_str().unwrap(),
            &digest.as_str()[..2]
        );
    }

    #[test]
    fn corrupt_blob_is_a_miss_and_removed() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 1024);
        let digest = cache.put(b"original").unwrap();
        fs::write(cache.blob_path(&digest), b"tampered").unwrap();

        assert!(cache.get(&digest).unwrap().is_none());
        assert!(!cache.contains(&digest));
    }

    #[test]
    fn put_repairs_truncated_blob() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 1024);
        let digest = cache.put(b"full content").unwrap();
        fs::write(cache.blob_path(&digest), b"full").unwrap();

        cache.put(b"full content").unwrap();
        assert_eq!(cache.get(&digest).unwrap().as_deref(), Some(&b"full content"[..]));
    }

    #[test]
    fn repaired_blob_is_counted_once() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 1024);
        cache.put(&[b'a'; 100]).unwrap();
        let digest = cache.put(&[b'b'; 100]).unwrap();
        fs::write(cache.blob_path(&digest), [b'b'; 10]).unwrap();

        cache.put(&[b'b'; 100]).unwrap();
        assert_eq!(cache.usage_bytes().unwrap(), 200);
    }

    #[test]
    fn usage_counts_a_new_blob_once_when_starting_cold() {
        let tmp = TempDir::new().unwrap();
        cache(&tmp, 1024).put(&[b'a'; 100]).unwrap();

        // A second handle on the same root starts with unknown usage.
        let cold = cache(&tmp, 1024);
        cold.put(&[b'b'; 100]).unwrap();
        assert_eq!(cold.usage_bytes().unwrap(), 200);
    }

    #[test]
    fn repair_near_capacity_does_not_evict_other_blobs() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 200);
        let keep = cache.put(&[b'a'; 100]).unwrap();
        let digest = cache.put(&[b'b'; 100]).unwrap();
        fs::write(cache.blob_path(&digest), [b'b'; 10]).unwrap();

        cache.put(&[b'b'; 100]).unwrap();
        assert!(cache.contains(&keep));
        assert!(cache.contains(&digest));
    }

    #[test]
    fn eviction_removes_least_recently_used_first() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 1024);
        let old = cache.put(&[b'a'; 100]).unwrap();
        let mid = cache.put(&[b'b'; 100]).unwrap();
        let new = cache.put(&[b'c'; 100]).unwrap();
        age(&cache.blob_path(&old), 300);
        age(&cache.blob_path(&mid), 200);
        age(&cache.blob_path(&new), 100);

        let report = cache.evict(200).unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.freed_bytes, 100);
        assert!(!cache.contains(&old));
        assert!(cache.contains(&mid));
        assert!(cache.contains(&new));
    }

    #[test]
    fn get_refreshes_recency() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 1024);
        let first = cache.put(&[b'a'; 100]).unwrap();
        let second = cache.put(&[b'b'; 100]).unwrap();
        age(&cache.blob_path(&first), 300);
        age(&cache.blob_path(&second), 200);

        cache.get(&first).unwrap().expect("hit");
        cache.evict(100).unwrap();

        assert!(cache.contains(&first), "recently read blob must survive");
        assert!(!cache.contains(&second));
    }

    #[test]
    fn put_over_capacity_evicts_older_blobs_but_keeps_new_one() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 150);
        let old = cache.put(&[b'a'; 100]).unwrap();
        age(&cache.blob_path(&old), 300);

        let new = cache.put(&[b'b'; 100]).unwrap();
        assert!(!cache.contains(&old));
        assert!(cache.contains(&new));
    }

    #[test]
    fn clear_removes_everything() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp, 1024);
        cache.put(b"one").unwrap();
        cache.put(b"two").unwrap();
        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.entries().unwrap().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn unwritable_root_surfaces_io_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("blobs");
        fs::create_dir_all(&root).unwrap();
        fs::set_permissions(&root, fs::Permissions::from_mode(0o555)).unwrap();

        let cache = ContentCache::new(&root, 1024);
        let result = cache.put(b"data");

        fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();
        // Running as root ignores directory permissions.
        if let Err(err) = result {
            assert!(matches!(err, CacheError::Io { .. }));
        }
    }
}
