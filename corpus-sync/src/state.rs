//! Sync state store: the manifest of the last successful sync per target.
//!
//! Persists a [`SyncState`] JSON document at
//! `<cache>/state/<project-key>.json`. Writes use the atomic `.tmp` + rename
//! pattern.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use corpus_core::{filter_manifest, Category, Manifest, Settings};

use crate::error::{io_err, SyncError};

/// On-disk state payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncState {
    pub timestamp: DateTime<Utc>,
    /// Commit id, or the requested reference when the commit is unknown.
    pub version: Option<String>,
    pub categories: Vec<Category>,
    pub manifest: Manifest,
}

#[derive(Debug, Deserialize)]
struct SyncStateCompat {
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    manifest: Manifest,
}

impl SyncState {
    pub fn new(version: Option<String>, categories: Vec<Category>, manifest: Manifest) -> Self {
        Self {
            timestamp: Utc::now(),
            version,
            categories,
            manifest,
        }
    }

    /// Saved entries restricted to `categories`.
    pub fn manifest_for(&self, categories: &[Category]) -> Manifest {
        filter_manifest(&self.manifest, categories)
    }

    /// Replace the entries of `categories` with `fresh`, keeping every entry
    /// of other categories.
    pub fn merge(&mut self, categories: &[Category], fresh: Manifest) {
        self.manifest
            .retain(|path, _| !categories.iter().any(|c| path.in_category(c)));
        self.manifest.extend(fresh);
        for category in categories {
            if !self.categories.contains(category) {
                self.categories.push(category.clone());
            }
        }
        self.categories.sort();
    }
}

/// `<dir name>-<first 12 hex of sha256(canonical target path)>`.
pub fn project_key(target: &Path) -> String {
    let canonical = target
        .canonicalize()
        .unwrap_or_else(|_| target.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash = hex::encode(hasher.finalize());

    let name: String = canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string())
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    format!("{name}-{}", &hash[..12])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// State file for `target` under `state_dir`.
    pub fn for_target(state_dir: &Path, target: &Path) -> Self {
        Self::at(state_dir.join(format!("{}.json", project_key(target))))
    }

    pub fn from_settings(settings: &Settings, target: &Path) -> Self {
        Self::for_target(&settings.state_dir(), target)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the target was never synced.
    pub fn load(&self) -> Result<Option<SyncState>, SyncError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err("read sync state", &self.path, e)),
        };
        let compat: SyncStateCompat =
            serde_json::from_str(&contents).map_err(|source| SyncError::StateCorrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(SyncState {
            timestamp: compat.timestamp.unwrap_or_else(Utc::now),
            version: compat.version,
            categories: compat.categories,
            manifest: compat.manifest,
        }))
    }

    /// Like [`load`](Self::load), but a corrupt file counts as never synced.
    pub fn load_lenient(&self) -> Result<Option<SyncState>, SyncError> {
        match self.load() {
            Err(SyncError::StateCorrupt { path, source }) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "ignoring corrupt sync state; treating as first sync"
                );
                Ok(None)
            }
            other => other,
        }
    }

    /// Save atomically: write `<path>.tmp`, then rename over `<path>`.
    pub fn save(&self, state: &SyncState) -> Result<(), SyncError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                "save sync state",
                &self.path,
                std::io::Error::other("invalid sync state path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err("create state dir", dir, e))?;

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err("write sync state", &tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err("rename sync state", &self.path, e));
        }
        tracing::debug!(path = %self.path.display(), files = state.manifest.len(), "sync state saved");
        Ok(())
    }
}
