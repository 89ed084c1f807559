//! Content-gated atomic writer for target trees.
//!
//! ## `atomic_write`
//!
//! 1. Hash the new content.
//! 2. Hash what is on disk; skip if identical.
//! 3. Write to `.<name>.corpus.tmp` next to the destination.
//! 4. Rename over the destination (atomic on POSIX).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use corpus_core::{Digest, RelPath};

use crate::error::{io_err, SyncError};
use crate::tree;

/// Suffix of in-flight temp files; tree walks skip them.
pub const TMP_SUFFIX: &str = ".corpus.tmp";

/// Outcome of an individual file operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "path", rename_all = "snake_case")]
pub enum WriteResult {
    /// Content changed or the file did not previously exist.
    Written(RelPath),
    /// On-disk content already matches.
    Unchanged(RelPath),
    /// Dry run: the file would have been written.
    WouldWrite(RelPath),
    Removed(RelPath),
    /// Dry run: the file would have been removed.
    WouldRemove(RelPath),
}

impl WriteResult {
    pub fn path(&self) -> &RelPath {
        match self {
            WriteResult::Written(p)
            | WriteResult::Unchanged(p)
            | WriteResult::WouldWrite(p)
            | WriteResult::Removed(p)
            | WriteResult::WouldRemove(p) => p,
        }
    }
}

/// Write `content` to `root/rel` unless it is already there.
pub fn atomic_write(
    root: &Path,
    rel: &RelPath,
    content: &[u8],
    dry_run: bool,
) -> Result<WriteResult, SyncError> {
    let path = rel.to_path(root);
    if tree::hash_file(root, rel)? == Some(Digest::of(content)) {
        tracing::debug!(path = %path.display(), "unchanged");
        return Ok(WriteResult::Unchanged(rel.clone()));
    }

    if dry_run {
        tracing::info!(path = %path.display(), "[dry-run] would write");
        return Ok(WriteResult::WouldWrite(rel.clone()));
    }

    let parent = path.parent().unwrap_or(root);
    fs::create_dir_all(parent).map_err(|e| io_err("create directory", parent, e))?;

    let tmp = tmp_path(&path);
    fs::write(&tmp, content).map_err(|e| io_err("write temp file", &tmp, e))?;
    if let Err(e) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err("rename into place", path, e));
    }

    tracing::info!(path = %path.display(), "wrote");
    Ok(WriteResult::Written(rel.clone()))
}

/// Delete `root/rel`. A file that is already gone counts as removed.
pub fn remove(root: &Path, rel: &RelPath, dry_run: bool) -> Result<WriteResult, SyncError> {
    let path = rel.to_path(root);
    if dry_run {
        tracing::info!(path = %path.display(), "[dry-run] would remove");
        return Ok(WriteResult::WouldRemove(rel.clone()));
    }
    match fs::remove_file(&path) {
        Ok(()) => tracing::info!(path = %path.display(), "removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_err("remove file", path, e)),
    }
    Ok(WriteResult::Removed(rel.clone()))
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}{TMP_SUFFIX}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::TempDir;

    fn rel(p: &str) -> RelPath {
        RelPath::new(p).unwrap()
    }

    #[test]
    fn first_write_returns_written() {
        let tmp = TempDir::new().unwrap();
        let result = atomic_write(tmp.path(), &rel("core/a.md"), b"hello", false).unwrap();
        assert_eq!(result, WriteResult::Written(rel("core/a.md")));
        assert_eq!(fs::read(tmp.path().join("core/a.md")).unwrap(), b"hello");
    }

    #[test]
    fn same_content_returns_unchanged_and_keeps_mtime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("core/a.md");
        atomic_write(tmp.path(), &rel("core/a.md"), b"hello", false).unwrap();
        let old = FileTime::from_unix_time(1_000_000, 0);
        filetime::set_file_mtime(&path, old).unwrap();

        let result = atomic_write(tmp.path(), &rel("core/a.md"), b"hello", false).unwrap();
        assert_eq!(result, WriteResult::Unchanged(rel("core/a.md")));
        let mtime = FileTime::from_last_modification_time(&fs::metadata(&path).unwrap());
        assert_eq!(mtime, old);
    }

    #[test]
    fn changed_content_is_rewritten() {
        let tmp = TempDir::new().unwrap();
        atomic_write(tmp.path(), &rel("core/a.md"), b"one", false).unwrap();
        let result = atomic_write(tmp.path(), &rel("core/a.md"), b"two", false).unwrap();
        assert!(matches!(result, WriteResult::Written(_)));
        assert_eq!(fs::read(tmp.path().join("core/a.md")).unwrap(), b"two");
    }

    #[test]
    fn dry_run_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let result = atomic_write(tmp.path(), &rel("core/a.md"), b"x", true).unwrap();
        assert_eq!(result, WriteResult::WouldWrite(rel("core/a.md")));
        assert!(!tmp.path().join("core").exists());

        fs::create_dir_all(tmp.path().join("core")).unwrap();
        fs::write(tmp.path().join("core/b.md"), b"keep").unwrap();
        assert_eq!(
            remove(tmp.path(), &rel("core/b.md"), true).unwrap(),
            WriteResult::WouldRemove(rel("core/b.md"))
        );
        assert!(tmp.path().join("core/b.md").exists());
    }

    #[test]
    fn no_temp_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        atomic_write(tmp.path(), &rel("core/a.md"), b"x", false).unwrap();
        assert!(!tmp.path().join(format!("core/.a.md{TMP_SUFFIX}")).exists());
    }

    #[test]
    fn remove_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        atomic_write(tmp.path(), &rel("core/a.md"), b"x", false).unwrap();
        assert!(matches!(remove(tmp.path(), &rel("core/a.md"), false).unwrap(), WriteResult::Removed(_)));
        assert!(matches!(remove(tmp.path(), &rel("core/a.md"), false).unwrap(), WriteResult::Removed(_)));
        assert!(!tmp.path().join("core/a.md").exists());
    }

    #[test]
    fn write_through_a_file_in_the_way_fails() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("core"), b"not a dir").unwrap();
        let err = atomic_write(tmp.path(), &rel("core/a.md"), b"x", false).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }
}
