//! A [`Transport`] that copies from a plain directory instead of a remote.

use std::fs;
use std::path::{Path, PathBuf};

use corpus_transport::{
    validate_patterns, validate_remote, validate_version_ref, FailureKind, FetchOutcome,
    Transport, TransportError,
};

/// Copies files from `upstream` that match the session's patterns.
///
/// Validation mirrors the real transport, so tests exercise the same error
/// paths. `fetch_count` lets tests assert that no fetch happened.
#[derive(Debug)]
pub struct FakeTransport {
    upstream: PathBuf,
    session: Option<PathBuf>,
    patterns: Vec<String>,
    fetches: usize,
    sessions_ended: usize,
    failure: Option<FailureKind>,
    available: bool,
    commit: Option<String>,
}

impl FakeTransport {
    pub fn new(upstream: impl Into<PathBuf>) -> Self {
        Self {
            upstream: upstream.into(),
            session: None,
            patterns: Vec::new(),
            fetches: 0,
            sessions_ended: 0,
            failure: None,
            available: true,
            commit: Some("0000000000000000000000000000000000fa6e".to_string()),
        }
    }

    /// Every fetch fails with `kind` and a canned stderr.
    pub fn failing(mut self, kind: FailureKind) -> Self {
        self.failure = Some(kind);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn with_commit(mut self, commit: Option<&str>) -> Self {
        self.commit = commit.map(str::to_string);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    pub fn sessions_ended(&self) -> usize {
        self.sessions_ended
    }

    /// Patterns registered in the current or most recent session.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    fn matches(&self, rel: &str) -> bool {
        self.patterns.iter().any(|p| match p.strip_suffix('/') {
            Some(dir) => rel.starts_with(&format!("{dir}/")),
            None => rel == p,
        })
    }

    fn copy_matching(&self, dir: &Path, dest: &Path) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_name() == ".git" {
                continue;
            }
            if entry.file_type()?.is_dir() {
                self.copy_matching(&path, dest)?;
                continue;
            }
            let Ok(rel) = path.strip_prefix(&self.upstream) else {
                continue;
            };
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if self.matches(&rel) {
                let out = dest.join(&rel);
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&path, &out)?;
            }
        }
        Ok(())
    }
}

impl Transport for FakeTransport {
    fn is_available(&self) -> bool {
        self.available
    }

    fn begin_session(&mut self, dir: &Path) -> Result<(), TransportError> {
        if !self.available {
            return Err(TransportError::Unavailable {
                binary: "git".to_string(),
            });
        }
        fs::create_dir_all(dir).map_err(|source| TransportError::Io {
            operation: "create session dir",
            path: dir.to_path_buf(),
            source,
        })?;
        self.session = Some(dir.to_path_buf());
        self.patterns.clear();
        Ok(())
    }

    fn restrict_to(&mut self, patterns: &[String]) -> Result<(), TransportError> {
        if self.session.is_none() {
            return Err(TransportError::NoSession {
                operation: "restrict_to",
            });
        }
        validate_patterns(patterns)?;
        self.patterns.extend(patterns.iter().cloned());
        Ok(())
    }

    fn fetch(
        &mut self,
        remote: &str,
        version_ref: Option<&str>,
    ) -> Result<FetchOutcome, TransportError> {
        let Some(dir) = self.session.clone() else {
            return Err(TransportError::NoSession { operation: "fetch" });
        };
        validate_remote(remote)?;
        if let Some(reference) = version_ref {
            validate_version_ref(reference)?;
        }
        self.fetches += 1;

        if let Some(kind) = self.failure {
            return Err(TransportError::CommandFailed {
                operation: "fetch".to_string(),
                status: Some(128),
                kind,
                stderr: format!("fatal: simulated {kind}\n"),
                dir,
            });
        }

        self.copy_matching(&self.upstream, &dir)
            .map_err(|source| TransportError::Io {
                operation: "copy upstream",
                path: self.upstream.clone(),
                source,
            })?;

        Ok(FetchOutcome {
            reference: version_ref.unwrap_or("HEAD").to_string(),
            commit: self.commit.clone(),
        })
    }

    fn end_session(&mut self) -> Result<(), TransportError> {
        if let Some(dir) = self.session.take() {
            self.sessions_ended += 1;
            let _ = fs::remove_dir_all(dir);
        }
        Ok(())
    }

    fn session_dir(&self) -> Option<&Path> {
        self.session.as_deref()
    }
}
