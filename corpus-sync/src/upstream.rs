//! Fetching a snapshot of the upstream corpus through a [`Transport`].

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use corpus_core::{Category, Digest, Manifest, RelPath, Settings};
use corpus_transport::{FetchOutcome, SparseCheckout, Transport};

use crate::error::{io_err, SyncError};
use crate::{tree, writer};

/// Upstream files for a set of categories, held in memory.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub categories: Vec<Category>,
    pub files: BTreeMap<RelPath, Vec<u8>>,
    pub outcome: FetchOutcome,
}

impl Upstream {
    pub fn manifest(&self) -> Manifest {
        self.files
            .iter()
            .map(|(path, bytes)| (path.clone(), Digest::of(bytes)))
            .collect()
    }

    /// Commit id when known, otherwise the requested reference.
    pub fn version(&self) -> String {
        self.outcome
            .commit
            .clone()
            .unwrap_or_else(|| self.outcome.reference.clone())
    }

    /// Replace the fetched categories in the local source mirror.
    pub fn mirror_into(&self, source_dir: &Path) -> Result<(), SyncError> {
        for category in &self.categories {
            let dir = source_dir.join(category.as_str());
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_err("clear source mirror", dir, e)),
            }
        }
        for (rel, bytes) in &self.files {
            writer::atomic_write(source_dir, rel, bytes, false)?;
        }
        tracing::debug!(dir = %source_dir.display(), files = self.files.len(), "source mirror refreshed");
        Ok(())
    }
}

/// Sparse-fetch `categories` from `remote` and read them into memory.
///
/// The session directory lives under `<cache>/sessions` and is removed
/// before this returns, on success and on error.
pub fn fetch_upstream(
    transport: &mut dyn Transport,
    settings: &Settings,
    categories: &[Category],
    remote: &str,
    version_ref: Option<&str>,
) -> Result<Upstream, SyncError> {
    let dir = session_dir(settings);
    let patterns: Vec<String> = categories.iter().map(Category::pattern).collect();

    let mut checkout = SparseCheckout::begin(transport, &dir)?;
    checkout.restrict_to(&patterns)?;
    let outcome = checkout.fetch(remote, version_ref)?;
    let files = tree::read_tree(checkout.dir(), categories)?;

    if let Err(err) = checkout.finish() {
        tracing::warn!(dir = %dir.display(), error = %err, "session cleanup failed");
    }

    tracing::info!(
        remote,
        version = outcome.commit.as_deref().unwrap_or(&outcome.reference),
        files = files.len(),
        "upstream snapshot ready"
    );
    Ok(Upstream {
        categories: categories.to_vec(),
        files,
        outcome,
    })
}

fn session_dir(settings: &Settings) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    settings
        .sessions_dir()
        .join(format!("fetch-{}-{nanos}", std::process::id()))
}
