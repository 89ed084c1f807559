//! Cache-aware sync engine.
//!
//! ## `sync`
//!
//! 1. Enumerate candidates from the local source mirror.
//! 2. Hash each candidate and look it up in the content cache.
//! 3. `ratio = hits / candidates`, 0 for an empty set.
//! 4. Fetch when forced or when `ratio < threshold`.
//! 5. Not fetching: confirm the target already matches the mirror. Any
//!    mismatch falls through to 6.
//! 6. Fetching: copy changed upstream files into the target, cache every
//!    processed blob, refresh the mirror.

use std::path::Path;

use serde::Serialize;

use corpus_cache::BlobStore;
use corpus_core::settings::{validate_threshold, DEFAULT_CACHE_THRESHOLD};
use corpus_core::{Category, Digest, Manifest, RelPath, Settings};
use corpus_transport::Transport;

use crate::error::SyncError;
use crate::tree;
use crate::upstream::{fetch_upstream, Upstream};
use crate::writer::{self, WriteResult};

/// Inputs shared by the commands that may reach the network.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    pub categories: Vec<Category>,
    pub remote: Option<String>,
    pub version_ref: Option<String>,
    pub force: bool,
}

impl SyncOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            categories: settings.categories.clone(),
            remote: settings.remote_url.clone(),
            version_ref: settings.version_ref.clone(),
            force: false,
        }
    }

    pub(crate) fn remote(&self) -> Result<&str, SyncError> {
        self.remote.as_deref().ok_or(SyncError::NoRemote)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub file: RelPath,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub copied: Vec<RelPath>,
    /// Deleted from the target because upstream no longer has them.
    pub removed: Vec<RelPath>,
    /// Already identical in the target.
    pub skipped: Vec<RelPath>,
    pub errors: Vec<FileError>,
    /// Whether the transport was used.
    pub fetched: bool,
    pub cache_hit_ratio: f64,
    /// Upstream version, when a fetch happened.
    pub version: Option<String>,
    /// Digests of every file now in sync with the source.
    pub manifest: Manifest,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct SyncEngine<'a> {
    settings: &'a Settings,
    cache: &'a dyn BlobStore,
}

impl<'a> SyncEngine<'a> {
    pub fn new(settings: &'a Settings, cache: &'a dyn BlobStore) -> Self {
        Self { settings, cache }
    }

    /// Candidate files according to the local source mirror.
    pub fn candidates(&self, categories: &[Category]) -> Result<Vec<RelPath>, SyncError> {
        tree::list_files(&self.settings.source_dir, categories)
    }

    /// Fraction of `candidates` whose current source content is cached.
    ///
    /// Never fails: a cache error yields 0.0, an unreadable source counts as
    /// a miss.
    pub fn calculate_cache_hit_ratio(&self, candidates: &[RelPath]) -> f64 {
        if candidates.is_empty() {
            return 0.0;
        }
        let mut hits = 0usize;
        for rel in candidates {
            let bytes = match tree::read_file(&self.settings.source_dir, rel) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(err) => {
                    tracing::debug!(path = %rel, error = %err, "source unreadable; counting as miss");
                    continue;
                }
            };
            match self.cache.get(&Digest::of(&bytes)) {
                Ok(Some(_)) => hits += 1,
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "cache lookup failed; treating as uncached");
                    return 0.0;
                }
            }
        }
        hits as f64 / candidates.len().max(1) as f64
    }

    /// The configured threshold, or the default when it is out of range.
    pub fn threshold(&self) -> f64 {
        validate_threshold(self.settings.cache_threshold).unwrap_or_else(|| {
            tracing::warn!(
                value = self.settings.cache_threshold,
                default = DEFAULT_CACHE_THRESHOLD,
                "invalid cache threshold; using default"
            );
            DEFAULT_CACHE_THRESHOLD
        })
    }

    /// Decide whether the transport must run. Returns the decision and the
    /// ratio it was based on.
    pub fn is_fetch_needed(&self, categories: &[Category], force: bool) -> (bool, f64) {
        let candidates = match self.candidates(categories) {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::debug!(error = %err, "cannot enumerate candidates; fetching");
                return (true, 0.0);
            }
        };
        let ratio = self.calculate_cache_hit_ratio(&candidates);
        let needed = force || candidates.is_empty() || ratio < self.threshold();
        tracing::info!(candidates = candidates.len(), ratio, force, needed, "fetch decision");
        (needed, ratio)
    }

    /// Materialise `options.categories` into `target`.
    pub fn sync(
        &self,
        target: &Path,
        transport: &mut dyn Transport,
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError> {
        let categories = &options.categories;
        let (needed, ratio) = self.is_fetch_needed(categories, options.force);

        if !needed {
            match self.verify_target(target, categories) {
                Ok(Some(manifest)) => {
                    tracing::info!(files = manifest.len(), "target already matches the cached source");
                    return Ok(SyncReport {
                        copied: Vec::new(),
                        removed: Vec::new(),
                        skipped: manifest.keys().cloned().collect(),
                        errors: Vec::new(),
                        fetched: false,
                        cache_hit_ratio: ratio,
                        version: None,
                        manifest,
                    });
                }
                Ok(None) => tracing::info!("target differs from the cached source; fetching"),
                Err(err) => tracing::debug!(error = %err, "target verification failed; fetching"),
            }
        }

        let upstream = fetch_upstream(
            transport,
            self.settings,
            categories,
            options.remote()?,
            options.version_ref.as_deref(),
        )?;
        let mut report = self.apply(target, &upstream);
        report.cache_hit_ratio = ratio;

        if let Err(err) = upstream.mirror_into(&self.settings.source_dir) {
            tracing::warn!(error = %err, "failed to refresh the source mirror");
        }
        Ok(report)
    }

    /// Manifest of the candidates when every one of them is present in the
    /// target with the mirror's content, `None` on the first difference.
    fn verify_target(
        &self,
        target: &Path,
        categories: &[Category],
    ) -> Result<Option<Manifest>, SyncError> {
        let mut manifest = Manifest::new();
        for rel in self.candidates(categories)? {
            let Some(source) = tree::hash_file(&self.settings.source_dir, &rel)? else {
                return Ok(None);
            };
            if tree::hash_file(target, &rel)?.as_ref() != Some(&source) {
                tracing::debug!(path = %rel, "target differs from source");
                return Ok(None);
            }
            manifest.insert(rel, source);
        }
        Ok(Some(manifest))
    }

    /// Copy every upstream file that differs. Per-file failures are
    /// recorded and do not stop the rest.
    fn apply(&self, target: &Path, upstream: &Upstream) -> SyncReport {
        let mut report = SyncReport {
            copied: Vec::new(),
            removed: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            fetched: true,
            cache_hit_ratio: 0.0,
            version: Some(upstream.version()),
            manifest: Manifest::new(),
        };

        for (rel, bytes) in &upstream.files {
            match writer::atomic_write(target, rel, bytes, false) {
                Ok(WriteResult::Written(_)) => report.copied.push(rel.clone()),
                Ok(_) => report.skipped.push(rel.clone()),
                Err(err) => {
                    tracing::warn!(path = %rel, error = %err, "copy failed");
                    report.errors.push(FileError {
                        file: rel.clone(),
                        error: err.to_string(),
                    });
                    continue;
                }
            }
            report.manifest.insert(rel.clone(), self.cache_put(bytes));
        }
        report
    }

    /// Store `bytes`; a cache failure is logged and otherwise ignored.
    pub(crate) fn cache_put(&self, bytes: &[u8]) -> Digest {
        match self.cache.put(bytes) {
            Ok(digest) => digest,
            Err(err) => {
                tracing::debug!(error = %err, "cache put failed");
                Digest::of(bytes)
            }
        }
    }
}
