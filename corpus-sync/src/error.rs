//! Error types for corpus-sync.

use std::path::PathBuf;

use thiserror::Error;

use corpus_core::{PathError, RelPath, Remedy};
use corpus_transport::TransportError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The state file exists but cannot be parsed.
    #[error("sync state at {path} is corrupt: {source}")]
    StateCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An I/O error, annotated with the operation and path.
    #[error("I/O error during {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sync state JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("no remote configured for this project")]
    NoRemote,

    /// Paths changed both locally and upstream; nothing was applied.
    #[error("update blocked by {} conflicting file(s): {}", .conflicts.len(), preview(.conflicts))]
    UpdateBlocked { conflicts: Vec<RelPath> },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(
    operation: &'static str,
    path: impl Into<PathBuf>,
    source: std::io::Error,
) -> SyncError {
    SyncError::Io {
        operation,
        path: path.into(),
        source,
    }
}

fn preview(paths: &[RelPath]) -> String {
    const MAX: usize = 5;
    let mut shown: Vec<&str> = paths.iter().take(MAX).map(RelPath::as_str).collect();
    if paths.len() > MAX {
        shown.push("…");
    }
    shown.join(", ")
}

impl Remedy for SyncError {
    fn diagnosis(&self) -> String {
        match self {
            SyncError::Transport(err) => err.diagnosis(),
            other => other.to_string(),
        }
    }

    fn remedies(&self) -> Vec<String> {
        match self {
            SyncError::Transport(err) => err.remedies(),
            SyncError::StateCorrupt { path, .. } => vec![
                format!("Delete {} to start from a clean slate.", path.display()),
                "Run `corpus sync` to record fresh state.".to_string(),
            ],
            SyncError::Io { path, .. } => vec![format!(
                "Check permissions and free space at {}.",
                path.display()
            )],
            SyncError::Json(_) => vec!["Run `corpus sync` to rewrite the state file.".to_string()],
            SyncError::Path(_) => vec![
                "Use relative paths without `..` segments and category names without `/` or spaces."
                    .to_string(),
            ],
            SyncError::NoRemote => vec![
                "Pass --remote <url>.".to_string(),
                "Set CORPUS_REMOTE.".to_string(),
                "Add `remote: <url>` to .corpus.yaml in the project.".to_string(),
            ],
            SyncError::UpdateBlocked { .. } => vec![
                "Inspect the upstream changes with `corpus diff --patch`.".to_string(),
                "To keep your edits, copy them aside, discard them, and run `corpus update` again."
                    .to_string(),
                "To take the upstream version and lose local edits, run `corpus update --force`."
                    .to_string(),
            ],
        }
    }
}
