use std::path::{Path, PathBuf};

use crate::error::TransportError;

/// What a successful fetch resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// The reference that was requested, `HEAD` when none was given.
    pub reference: String,
    /// Resolved commit id, when the transport knows it.
    pub commit: Option<String>,
}

/// A sparse, shallow view of an upstream repository.
///
/// A session owns a working directory. `restrict_to` narrows what `fetch`
/// materialises there, and `end_session` removes the directory. Calls
/// outside a session fail with [`TransportError::NoSession`].
pub trait Transport {
    /// Whether the backing tool can run at all.
    fn is_available(&self) -> bool;

    fn begin_session(&mut self, dir: &Path) -> Result<(), TransportError>;

    /// Append path patterns. Nothing is written unless all of them validate.
    fn restrict_to(&mut self, patterns: &[String]) -> Result<(), TransportError>;

    /// Shallow-fetch `version_ref` (or the upstream default) from `remote`
    /// and populate the session directory with the restricted paths.
    fn fetch(
        &mut self,
        remote: &str,
        version_ref: Option<&str>,
    ) -> Result<FetchOutcome, TransportError>;

    /// Idempotent.
    fn end_session(&mut self) -> Result<(), TransportError>;

    fn session_dir(&self) -> Option<&Path>;
}

/// Scope guard around a transport session.
///
/// The session ends on drop, on every path out of the caller. Use
/// [`SparseCheckout::finish`] to observe cleanup errors instead of only
/// logging them.
pub struct SparseCheckout<'t, T: Transport + ?Sized> {
    transport: &'t mut T,
    dir: PathBuf,
}

impl<'t, T: Transport + ?Sized> SparseCheckout<'t, T> {
    pub fn begin(transport: &'t mut T, dir: &Path) -> Result<Self, TransportError> {
        if let Err(err) = transport.begin_session(dir) {
            // A half-initialised session may already own the directory.
            if let Err(cleanup) = transport.end_session() {
                tracing::warn!(error = %cleanup, "cleanup after failed session start");
            }
            return Err(err);
        }
        Ok(Self {
            transport,
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn restrict_to(&mut self, patterns: &[String]) -> Result<(), TransportError> {
        self.transport.restrict_to(patterns)
    }

    pub fn fetch(
        &mut self,
        remote: &str,
        version_ref: Option<&str>,
    ) -> Result<FetchOutcome, TransportError> {
        self.transport.fetch(remote, version_ref)
    }

    pub fn finish(self) -> Result<(), TransportError> {
        self.transport.end_session()
    }
}

impl<T: Transport + ?Sized> Drop for SparseCheckout<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.transport.end_session() {
            tracing::warn!(dir = %self.dir.display(), error = %err, "failed to clean up transport session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Records calls and materialises nothing.
    #[derive(Default)]
    struct Recorder {
        session: Option<PathBuf>,
        ended: usize,
        fail_begin: bool,
    }

    impl Transport for Recorder {
        fn is_available(&self) -> bool {
            true
        }

        fn begin_session(&mut self, dir: &Path) -> Result<(), TransportError> {
            fs::create_dir_all(dir).unwrap();
            self.session = Some(dir.to_path_buf());
            if self.fail_begin {
                return Err(TransportError::NoSession { operation: "begin" });
            }
            Ok(())
        }

        fn restrict_to(&mut self, _patterns: &[String]) -> Result<(), TransportError> {
            Ok(())
        }

        fn fetch(&mut self, _: &str, r: Option<&str>) -> Result<FetchOutcome, TransportError> {
            Ok(FetchOutcome {
                reference: r.unwrap_or("HEAD").to_string(),
                commit: None,
            })
        }

        fn end_session(&mut self) -> Result<(), TransportError> {
            if let Some(dir) = self.session.take() {
                self.ended += 1;
                let _ = fs::remove_dir_all(dir);
            }
            Ok(())
        }

        fn session_dir(&self) -> Option<&Path> {
            self.session.as_deref()
        }
    }

    #[test]
    fn guard_ends_session_on_drop() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("s");
        let mut transport = Recorder::default();
        {
            let mut guard = SparseCheckout::begin(&mut transport, &dir).unwrap();
            guard.restrict_to(&["core/".to_string()]).unwrap();
            assert!(dir.exists());
        }
        assert!(!dir.exists());
        assert_eq!(transport.ended, 1);
        assert!(transport.session_dir().is_none());
    }

    #[test]
    fn finish_then_drop_ends_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut transport = Recorder::default();
        let guard = SparseCheckout::begin(&mut transport, &tmp.path().join("s")).unwrap();
        guard.finish().unwrap();
        assert_eq!(transport.ended, 1);
    }

    #[test]
    fn failed_begin_still_cleans_up() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("s");
        let mut transport = Recorder {
            fail_begin: true,
            ..Recorder::default()
        };
        assert!(SparseCheckout::begin(&mut transport, &dir).is_err());
        assert!(!dir.exists());
        assert_eq!(transport.ended, 1);
    }
}
