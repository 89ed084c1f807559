//! [`Transport`] backed by the `git` command-line tool.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use corpus_core::Settings;

use crate::command::{run_with_timeout, CommandOutput};
use crate::error::{io_err, FailureKind, TransportError};
use crate::transport::{FetchOutcome, Transport};
use crate::validate::{validate_patterns, validate_remote, validate_version_ref};

const REMOTE_NAME: &str = "origin";

#[derive(Debug, Clone)]
pub struct GitTransport {
    binary: PathBuf,
    timeout: Duration,
    session: Option<PathBuf>,
}

impl GitTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            binary: PathBuf::from("git"),
            timeout,
            session: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.transport_timeout)
    }

    /// Use a specific executable instead of `git` from PATH.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn sparse_file(dir: &Path) -> PathBuf {
        dir.join(".git").join("info").join("sparse-checkout")
    }

    fn session(&self, operation: &'static str) -> Result<PathBuf, TransportError> {
        self.session
            .clone()
            .ok_or(TransportError::NoSession { operation })
    }

    fn git(&self, dir: &Path, operation: &str, args: &[&str]) -> Result<CommandOutput, TransportError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-c", "advice.detachedHead=false"])
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C");

        tracing::debug!(operation, ?args, dir = %dir.display(), "running git");
        let out = run_with_timeout(cmd, operation, dir, self.timeout)?;
        if out.status.success() {
            return Ok(out);
        }

        let kind = FailureKind::classify(&out.stderr);
        tracing::debug!(operation, %kind, stderr = %out.stderr.trim(), "git failed");
        Err(TransportError::CommandFailed {
            operation: operation.to_string(),
            status: out.status.code(),
            kind,
            stderr: out.stderr,
            dir: dir.to_path_buf(),
        })
    }
}

impl Default for GitTransport {
    fn default() -> Self {
        Self::new(corpus_core::settings::DEFAULT_TRANSPORT_TIMEOUT)
    }
}

impl Transport for GitTransport {
    fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn begin_session(&mut self, dir: &Path) -> Result<(), TransportError> {
        if !self.is_available() {
            return Err(TransportError::Unavailable {
                binary: self.binary.display().to_string(),
            });
        }
        if self.session.is_some() {
            self.end_session()?;
        }

        fs::create_dir_all(dir).map_err(|e| io_err("create session dir", dir, e))?;
        self.session = Some(dir.to_path_buf());

        self.git(dir, "init", &["init", "-q"])?;
        self.git(dir, "config", &["config", "core.sparseCheckout", "true"])?;

        let sparse = Self::sparse_file(dir);
        if let Some(info) = sparse.parent() {
            fs::create_dir_all(info).map_err(|e| io_err("create git info dir", info, e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&sparse)
            .map_err(|e| io_err("create sparse-checkout file", &sparse, e))?;

        tracing::debug!(dir = %dir.display(), "transport session started");
        Ok(())
    }

    fn restrict_to(&mut self, patterns: &[String]) -> Result<(), TransportError> {
        let dir = self.session("restrict_to")?;
        validate_patterns(patterns)?;

        let sparse = Self::sparse_file(&dir);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&sparse)
            .map_err(|e| io_err("open sparse-checkout file", &sparse, e))?;
        for pattern in patterns {
            writeln!(file, "{pattern}").map_err(|e| io_err("write sparse-checkout file", &sparse, e))?;
        }
        tracing::debug!(?patterns, "sparse patterns appended");
        Ok(())
    }

    fn fetch(
        &mut self,
        remote: &str,
        version_ref: Option<&str>,
    ) -> Result<FetchOutcome, TransportError> {
        let dir = self.session("fetch")?;
        validate_remote(remote)?;
        if let Some(reference) = version_ref {
            validate_version_ref(reference)?;
        }
        let reference = version_ref.unwrap_or("HEAD");

        let remotes = self.git(&dir, "remote", &["remote"])?;
        if remotes.stdout.lines().any(|line| line.trim() == REMOTE_NAME) {
            self.git(&dir, "remote set-url", &["remote", "set-url", REMOTE_NAME, remote])?;
        } else {
            self.git(&dir, "remote add", &["remote", "add", REMOTE_NAME, remote])?;
        }

        self.git(
            &dir,
            "fetch",
            &["fetch", "--depth", "1", "--no-tags", REMOTE_NAME, reference],
        )?;
        self.git(&dir, "checkout", &["checkout", "-q", "--force", "FETCH_HEAD"])?;

        let commit = self
            .git(&dir, "rev-parse", &["rev-parse", "HEAD"])
            .ok()
            .map(|out| out.stdout.trim().to_string())
            .filter(|id| !id.is_empty());

        tracing::info!(remote, reference, commit = ?commit, "fetched upstream");
        Ok(FetchOutcome {
            reference: reference.to_string(),
            commit,
        })
    }

    fn end_session(&mut self) -> Result<(), TransportError> {
        let Some(dir) = self.session.take() else {
            return Ok(());
        };
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!(dir = %dir.display(), "transport session removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err("remove session dir", dir, e)),
        }
    }

    fn session_dir(&self) -> Option<&Path> {
        self.session.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_outside_a_session_fail() {
        let mut git = GitTransport::default();
        assert!(matches!(
            git.restrict_to(&["core/".to_string()]),
            Err(TransportError::NoSession { operation: "restrict_to" })
        ));
        assert!(matches!(
            git.fetch("https://example.com/c.git", None),
            Err(TransportError::NoSession { operation: "fetch" })
        ));
    }

    #[test]
    fn end_session_without_session_is_a_no_op() {
        let mut git = GitTransport::default();
        git.end_session().unwrap();
        git.end_session().unwrap();
    }

    #[test]
    fn missing_binary_is_not_available() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut git = GitTransport::default().with_binary("corpus-no-such-git-7f3a");
        assert!(!git.is_available());
        assert!(matches!(
            git.begin_session(&tmp.path().join("s")),
            Err(TransportError::Unavailable { .. })
        ));
        assert!(git.session_dir().is_none());
    }
}
