//! Walking and hashing category subtrees on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use corpus_core::{Category, Digest, Manifest, RelPath};

use crate::error::{io_err, SyncError};
use crate::writer::TMP_SUFFIX;

/// Relative paths of every regular file under `root/<category>/`.
///
/// Missing category directories contribute nothing. Names that do not form
/// a valid [`RelPath`] and leftover temp files are skipped.
pub fn list_files(root: &Path, categories: &[Category]) -> Result<Vec<RelPath>, SyncError> {
    let mut files = Vec::new();
    for category in categories {
        let dir = root.join(category.as_str());
        if !dir.is_dir() {
            continue;
        }
        walk(root, &dir, &mut files)?;
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<RelPath>) -> Result<(), SyncError> {
    let entries = fs::read_dir(dir).map_err(|e| io_err("list directory", dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err("list directory", dir, e))?;
        let path = entry.path();
        let name = entry.file_name();
        if name == ".git" || name.to_string_lossy().ends_with(TMP_SUFFIX) {
            continue;
        }
        if path.is_dir() {
            walk(root, &path, out)?;
        } else if path.is_file() {
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            match RelPath::from_path(rel) {
                Ok(rel) => out.push(rel),
                Err(err) => tracing::warn!(path = %path.display(), error = %err, "skipping file"),
            }
        }
    }
    Ok(())
}

/// Bytes of `root/rel`, or `None` when the file does not exist.
pub fn read_file(root: &Path, rel: &RelPath) -> Result<Option<Vec<u8>>, SyncError> {
    let path = rel.to_path(root);
    match fs::read(&path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err("read file", path, e)),
    }
}

pub fn hash_file(root: &Path, rel: &RelPath) -> Result<Option<Digest>, SyncError> {
    Ok(read_file(root, rel)?.map(|bytes| Digest::of(&bytes)))
}

/// Manifest of the files currently on disk under the category directories.
pub fn scan(root: &Path, categories: &[Category]) -> Result<Manifest, SyncError> {
    let mut manifest = Manifest::new();
    for rel in list_files(root, categories)? {
        if let Some(digest) = hash_file(root, &rel)? {
            manifest.insert(rel, digest);
        }
    }
    Ok(manifest)
}

/// Contents of every file under the category directories.
pub fn read_tree(
    root: &Path,
    categories: &[Category],
) -> Result<BTreeMap<RelPath, Vec<u8>>, SyncError> {
    let mut files = BTreeMap::new();
    for rel in list_files(root, categories)? {
        if let Some(bytes) = read_file(root, &rel)? {
            files.insert(rel, bytes);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn cats(names: &[&str]) -> Vec<Category> {
        names.iter().map(|n| Category::new(n).unwrap()).collect()
    }

    #[test]
    fn lists_only_selected_categories_recursively() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "core/a.md", "a");
        write(tmp.path(), "core/deep/b.md", "b");
        write(tmp.path(), "agents/c.md", "c");
        write(tmp.path(), "README.md", "top");

        let files = list_files(tmp.path(), &cats(&["core"])).unwrap();
        let names: Vec<&str> = files.iter().map(RelPath::as_str).collect();
        assert_eq!(names, vec!["core/a.md", "core/deep/b.md"]);
    }

    #[test]
    fn missing_category_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(list_files(tmp.path(), &cats(&["core"])).unwrap().is_empty());
        assert!(scan(&tmp.path().join("absent"), &cats(&["core"])).unwrap().is_empty());
    }

    #[test]
    fn temp_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "core/a.md", "a");
        write(tmp.path(), &format!("core/.a.md{TMP_SUFFIX}"), "partial");
        assert_eq!(list_files(tmp.path(), &cats(&["core"])).unwrap().len(), 1);
    }

    #[test]
    fn scan_hashes_raw_bytes() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "core/crlf.md", "line\r\n");
        let manifest = scan(tmp.path(), &cats(&["core"])).unwrap();
        let rel = RelPath::new("core/crlf.md").unwrap();
        assert_eq!(manifest[&rel], Digest::of(b"line\r\n"));
        assert_ne!(manifest[&rel], Digest::of(b"line\n"));
    }

    #[test]
    fn read_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let rel = RelPath::new("core/none.md").unwrap();
        assert_eq!(read_file(tmp.path(), &rel).unwrap(), None);
        assert_eq!(hash_file(tmp.path(), &rel).unwrap(), None);
    }
}
