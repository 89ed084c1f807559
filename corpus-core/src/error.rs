//! Error types for corpus-core, plus the [`Remedy`] surface every fatal
//! error in the workspace implements.

use std::path::PathBuf;

use thiserror::Error;

/// Validation failures for paths, categories and digests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid path '{path}': {reason}")]
    Invalid { path: String, reason: &'static str },

    #[error("invalid category '{name}': {reason}")]
    InvalidCategory { name: String, reason: &'static str },

    #[error("invalid digest '{value}': expected 64 hex characters")]
    InvalidDigest { value: String },
}

/// Errors raised while resolving settings or reading a project config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `CORPUS_CACHE_DIR` nor a platform cache/home directory is known.
    #[error("cannot determine a cache directory; set CORPUS_CACHE_DIR")]
    NoCacheDir,

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Project config YAML is malformed; includes path and serde_yaml location.
    #[error("failed to parse project config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// User-facing diagnosis and numbered recovery steps for a fatal error.
pub trait Remedy {
    /// One-line description of what went wrong.
    fn diagnosis(&self) -> String;

    /// Ordered recovery steps. Empty when there is nothing useful to suggest.
    fn remedies(&self) -> Vec<String>;
}

impl Remedy for PathError {
    fn diagnosis(&self) -> String {
        self.to_string()
    }

    fn remedies(&self) -> Vec<String> {
        match self {
            PathError::Invalid { .. } => vec![
                "Use a relative path with `/` separators.".to_string(),
                "Remove leading `/`, `..` segments and empty segments.".to_string(),
            ],
            PathError::InvalidCategory { .. } => vec![
                "Category names are single top-level directory names, e.g. `core`.".to_string(),
                "Separate several categories with commas: `-c core,agents`.".to_string(),
            ],
            PathError::InvalidDigest { .. } => vec![
                "Digests are lowercase SHA-256 hex strings (64 characters).".to_string(),
            ],
        }
    }
}

impl Remedy for ConfigError {
    fn diagnosis(&self) -> String {
        self.to_string()
    }

    fn remedies(&self) -> Vec<String> {
        match self {
            ConfigError::NoCacheDir => vec![
                "Export CORPUS_CACHE_DIR=/path/to/cache.".to_string(),
                "Or make sure $HOME is set.".to_string(),
            ],
            ConfigError::Io { path, .. } => vec![format!(
                "Check that {} is readable.",
                path.display()
            )],
            ConfigError::Parse { path, .. } => vec![
                format!("Fix the YAML in {}.", path.display()),
                "Valid keys are `remote`, `ref` and `categories`.".to_string(),
            ],
        }
    }
}
