//! Error types for corpus-cache.

use std::path::PathBuf;

use thiserror::Error;

use corpus_core::Remedy;

/// Cache failures. Callers on the sync path treat every variant as a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An I/O error, annotated with the operation and path.
    #[error("cache {operation} failed at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`CacheError::Io`].
pub(crate) fn io_err(
    operation: &'static str,
    path: impl Into<PathBuf>,
    source: std::io::Error,
) -> CacheError {
    CacheError::Io {
        operation,
        path: path.into(),
        source,
    }
}

impl Remedy for CacheError {
    fn diagnosis(&self) -> String {
        self.to_string()
    }

    fn remedies(&self) -> Vec<String> {
        match self {
            CacheError::Io { path, .. } => vec![
                format!("Check permissions and free space at {}.", path.display()),
                "Point CORPUS_CACHE_DIR at a writable directory.".to_string(),
                "Run `corpus cache clear` to start from an empty cache.".to_string(),
            ],
        }
    }
}
