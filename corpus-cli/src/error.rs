//! Failures raised by the command layer itself, after the libraries have
//! returned.

use std::path::PathBuf;

use thiserror::Error;

use corpus_core::Remedy;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("target directory {} does not exist", path.display())]
    TargetMissing { path: PathBuf },

    /// The command ran, but some files were left behind.
    #[error("{count} file(s) could not be {operation}")]
    PartialFailure {
        count: usize,
        operation: &'static str,
    },

    #[error("cache health check failed at {}", root.display())]
    CacheUnhealthy {
        root: PathBuf,
        diagnostics: Vec<String>,
    },
}

impl Remedy for CliError {
    fn diagnosis(&self) -> String {
        match self {
            CliError::CacheUnhealthy { diagnostics, .. } if !diagnostics.is_empty() => {
                format!("{self}: {}", diagnostics.join("; "))
            }
            _ => self.to_string(),
        }
    }

    fn remedies(&self) -> Vec<String> {
        match self {
            CliError::TargetMissing { path } => vec![
                format!("Create it first: mkdir -p {}", path.display()),
                "Pass --target with an existing project directory.".to_string(),
            ],
            CliError::PartialFailure { operation, .. } => vec![
                "Check permissions on the files listed above.".to_string(),
                format!("Re-run the command; files already {operation} are skipped."),
                "Run with -v to see why each file failed.".to_string(),
            ],
            CliError::CacheUnhealthy { root, .. } => vec![
                format!("Check permissions and free space at {}.", root.display()),
                "Point CORPUS_CACHE_DIR at a writable directory.".to_string(),
                "Run `corpus cache clear` to start from an empty cache.".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_target_suggests_creating_it() {
        let err = CliError::TargetMissing {
            path: PathBuf::from("/srv/project"),
        };
        assert_eq!(err.diagnosis(), "target directory /srv/project does not exist");
        assert!(err.remedies()[0].contains("mkdir -p /srv/project"));
    }

    #[test]
    fn unhealthy_cache_names_each_diagnostic() {
        let err = CliError::CacheUnhealthy {
            root: PathBuf::from("/c"),
            diagnostics: vec!["/c is not writable".into(), "cannot list blobs".into()],
        };
        assert_eq!(
            err.diagnosis(),
            "cache health check failed at /c: /c is not writable; cannot list blobs"
        );
        assert!(err.remedies()[0].contains("/c"));
        assert!(err.remedies().last().unwrap().contains("cache clear"));
    }

    #[test]
    fn partial_failure_names_the_operation() {
        let err = CliError::PartialFailure {
            count: 2,
            operation: "synced",
        };
        assert_eq!(err.diagnosis(), "2 file(s) could not be synced");
        assert!(err.remedies().iter().any(|r| r.contains("already synced")));
    }
}
