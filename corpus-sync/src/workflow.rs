//! The four project workflows: `status`, `diff`, `update` and `sync`.
//!
//! | workflow | network | compares                 | writes target | saves state |
//! |----------|---------|--------------------------|---------------|-------------|
//! | status   | no      | target vs saved          | no            | no          |
//! | diff     | yes     | upstream vs saved        | no            | no          |
//! | update   | yes     | both, conflicts = overlap | yes          | yes         |
//! | sync     | maybe   | cache ratio vs threshold | yes           | yes         |

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use corpus_cache::BlobStore;
use corpus_core::{filter_manifest, Category, Manifest, RelPath, Settings};
use corpus_transport::Transport;

use crate::compare::{compare, Comparison};
use crate::engine::{FileError, SyncEngine, SyncOptions, SyncReport};
use crate::error::SyncError;
use crate::patch::{self, FilePatch};
use crate::state::{StateStore, SyncState};
use crate::upstream::{fetch_upstream, Upstream};
use crate::writer::{self, WriteResult};
use crate::tree;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub target: PathBuf,
    pub categories: Vec<Category>,
    pub last_sync: Option<DateTime<Utc>>,
    pub version: Option<String>,
    /// `None` when the target was never synced.
    pub comparison: Option<Comparison>,
}

impl StatusReport {
    pub fn has_state(&self) -> bool {
        self.comparison.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffReport {
    pub version: String,
    /// Upstream against the saved manifest.
    pub comparison: Comparison,
    pub patches: Vec<FilePatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateReport {
    pub version: String,
    pub dry_run: bool,
    pub forced: bool,
    /// Target against the saved manifest.
    pub local: Comparison,
    /// Upstream against the saved manifest.
    pub remote: Comparison,
    pub conflicts: Vec<RelPath>,
    pub actions: Vec<WriteResult>,
    pub errors: Vec<FileError>,
}

/// A consumer project: a target tree plus its saved sync state.
pub struct Project<'a> {
    target: PathBuf,
    settings: &'a Settings,
    cache: &'a dyn BlobStore,
    store: StateStore,
}

impl<'a> Project<'a> {
    pub fn open(target: &Path, settings: &'a Settings, cache: &'a dyn BlobStore) -> Self {
        Self {
            target: target.to_path_buf(),
            settings,
            cache,
            store: StateStore::from_settings(settings, target),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn state_store(&self) -> &StateStore {
        &self.store
    }

    fn saved(&self, categories: &[Category]) -> Result<(Option<SyncState>, Manifest), SyncError> {
        let state = self.store.load_lenient()?;
        let saved = state
            .as_ref()
            .map(|s| s.manifest_for(categories))
            .unwrap_or_default();
        Ok((state, saved))
    }

    /// Local drift since the last sync. No network access.
    pub fn status(&self, categories: &[Category]) -> Result<StatusReport, SyncError> {
        let (state, saved) = self.saved(categories)?;
        let Some(state) = state else {
            return Ok(StatusReport {
                target: self.target.clone(),
                categories: categories.to_vec(),
                last_sync: None,
                version: None,
                comparison: None,
            });
        };

        let current = tree::scan(&self.target, categories)?;
        Ok(StatusReport {
            target: self.target.clone(),
            categories: categories.to_vec(),
            last_sync: Some(state.timestamp),
            version: state.version,
            comparison: Some(compare(&current, &saved)),
        })
    }

    /// Pending upstream changes, without applying them.
    pub fn diff(
        &self,
        transport: &mut dyn Transport,
        options: &SyncOptions,
        with_patches: bool,
    ) -> Result<DiffReport, SyncError> {
        let (_, saved) = self.saved(&options.categories)?;
        let upstream = self.fetch(transport, options)?;
        let comparison = compare(&upstream.manifest(), &saved);

        let patches = if with_patches {
            comparison
                .added
                .iter()
                .chain(&comparison.modified)
                .chain(&comparison.removed)
                .map(|rel| {
                    let before = self.saved_bytes(rel, &saved);
                    let after = upstream.files.get(rel).map(Vec::as_slice).unwrap_or_default();
                    patch::render(rel, &before, after)
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(DiffReport {
            version: upstream.version(),
            comparison,
            patches,
        })
    }

    /// Content as of the last sync: the cached blob, else the local file.
    fn saved_bytes(&self, rel: &RelPath, saved: &Manifest) -> Vec<u8> {
        if let Some(digest) = saved.get(rel) {
            match self.cache.get(digest) {
                Ok(Some(bytes)) => return bytes,
                Ok(None) => {}
                Err(err) => tracing::debug!(error = %err, "cache lookup failed"),
            }
        }
        tree::read_file(&self.target, rel)
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Apply upstream changes, refusing paths that also changed locally
    /// unless `options.force` is set.
    pub fn update(
        &self,
        transport: &mut dyn Transport,
        options: &SyncOptions,
        dry_run: bool,
    ) -> Result<UpdateReport, SyncError> {
        let categories = &options.categories;
        let (state, saved) = self.saved(categories)?;
        let current = tree::scan(&self.target, categories)?;
        let local = compare(&current, &saved);

        let upstream = self.fetch(transport, options)?;
        let upstream_manifest = upstream.manifest();
        let remote = compare(&upstream_manifest, &saved);

        let local_drift = local.changed();
        let conflicts: Vec<RelPath> = remote
            .changed()
            .intersection(&local_drift)
            .filter(|rel| current.get(**rel) != upstream_manifest.get(**rel))
            .map(|rel| (*rel).clone())
            .collect();

        if !conflicts.is_empty() && !options.force && !dry_run {
            tracing::warn!(count = conflicts.len(), "update blocked by conflicts");
            return Err(SyncError::UpdateBlocked { conflicts });
        }

        let blocked: BTreeSet<&RelPath> = if options.force {
            BTreeSet::new()
        } else {
            conflicts.iter().collect()
        };

        let mut actions = Vec::new();
        let mut errors = Vec::new();
        let engine = SyncEngine::new(self.settings, self.cache);

        for rel in remote.changed() {
            if blocked.contains(rel) {
                continue;
            }
            let result = match upstream.files.get(rel) {
                Some(bytes) => writer::atomic_write(&self.target, rel, bytes, dry_run).map(|r| {
                    if !dry_run {
                        engine.cache_put(bytes);
                    }
                    r
                }),
                None => writer::remove(&self.target, rel, dry_run),
            };
            match result {
                Ok(action) => actions.push(action),
                Err(err) => {
                    tracing::warn!(path = %rel, error = %err, "update failed for file");
                    errors.push(FileError {
                        file: rel.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        if !dry_run {
            let mut fresh = upstream_manifest;
            for failure in &errors {
                match saved.get(&failure.file) {
                    Some(old) => fresh.insert(failure.file.clone(), old.clone()),
                    None => fresh.remove(&failure.file),
                };
            }
            let mut state = state.unwrap_or_else(|| SyncState::new(None, Vec::new(), Manifest::new()));
            state.timestamp = Utc::now();
            state.version = Some(upstream.version());
            state.merge(categories, fresh);
            self.store.save(&state)?;

            if let Err(err) = upstream.mirror_into(&self.settings.source_dir) {
                tracing::warn!(error = %err, "failed to refresh the source mirror");
            }
        }

        Ok(UpdateReport {
            version: upstream.version(),
            dry_run,
            forced: options.force,
            local,
            remote,
            conflicts,
            actions,
            errors,
        })
    }

    /// Run the engine and record the result as the new saved state.
    ///
    /// Files that failed to copy keep their previously saved digest.
    pub fn sync(
        &self,
        transport: &mut dyn Transport,
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError> {
        let prior = self.store.load_lenient()?;
        let mut report =
            SyncEngine::new(self.settings, self.cache).sync(&self.target, transport, options)?;

        let mut fresh = report.manifest.clone();
        if let Some(prior) = &prior {
            for failure in &report.errors {
                if let Some(old) = prior.manifest.get(&failure.file) {
                    fresh.insert(failure.file.clone(), old.clone());
                }
            }
            let previous = filter_manifest(&prior.manifest, &options.categories);
            fresh.extend(self.prune_dropped(&previous, &mut report));
        }

        let mut state = prior.unwrap_or_else(|| SyncState::new(None, Vec::new(), Manifest::new()));
        state.timestamp = Utc::now();
        if report.version.is_some() {
            state.version = report.version.clone();
        }
        state.merge(&options.categories, fresh);
        self.store.save(&state)?;

        tracing::info!(
            copied = report.copied.len(),
            removed = report.removed.len(),
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            fetched = report.fetched,
            "sync finished"
        );
        Ok(report)
    }

    /// Delete synced files that the source no longer has.
    ///
    /// Only files still matching their saved digest go. Locally edited ones
    /// stay on disk and keep their saved digest, so they show up as
    /// modified rather than as untracked additions. Returns the entries to
    /// keep in the saved manifest.
    fn prune_dropped(&self, previous: &Manifest, report: &mut SyncReport) -> Manifest {
        let mut kept = Manifest::new();
        for (rel, saved) in previous {
            if report.manifest.contains_key(rel) || report.errors.iter().any(|e| &e.file == rel) {
                continue;
            }
            let outcome = tree::hash_file(&self.target, rel).and_then(|current| match current {
                None => Ok(None),
                Some(digest) if digest == *saved => writer::remove(&self.target, rel, false).map(Some),
                Some(_) => {
                    tracing::info!(path = %rel, "keeping locally modified file dropped upstream");
                    kept.insert(rel.clone(), saved.clone());
                    Ok(None)
                }
            });
            match outcome {
                Ok(Some(_)) => report.removed.push(rel.clone()),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(path = %rel, error = %err, "could not remove dropped file");
                    kept.insert(rel.clone(), saved.clone());
                    report.errors.push(FileError {
                        file: rel.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        kept
    }

    fn fetch(
        &self,
        transport: &mut dyn Transport,
        options: &SyncOptions,
    ) -> Result<Upstream, SyncError> {
        fetch_upstream(
            transport,
            self.settings,
            &options.categories,
            options.remote()?,
            options.version_ref.as_deref(),
        )
    }
}
