//! Error types for corpus-transport.
//!
//! [`FailureKind`] is derived from git's stderr. It is advisory: it picks
//! the recovery text shown to the user and nothing else, and the raw stderr
//! always travels with the error.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use corpus_core::Remedy;

/// Coarse class of a failed transport command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Permission,
    Network,
    Auth,
    LockContention,
    DiskExhausted,
    Unknown,
}

impl FailureKind {
    /// Classify from captured diagnostic text.
    ///
    /// Auth is checked before permission: `Permission denied (publickey)` is
    /// an SSH authentication failure, not a filesystem one.
    pub fn classify(stderr: &str) -> Self {
        let text = stderr.to_ascii_lowercase();
        let any = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

        if any(&[
            "authentication failed",
            "could not read username",
            "could not read password",
            "permission denied (publickey",
            "terminal prompts disabled",
            "invalid username or password",
            "http basic: access denied",
            "returned error: 401",
            "returned error: 403",
        ]) {
            FailureKind::Auth
        } else if any(&[
            ".lock': file exists",
            "index.lock",
            "shallow.lock",
            "another git process seems to be running",
            "unable to create '",
        ]) {
            FailureKind::LockContention
        } else if any(&["no space left on device", "disk quota exceeded", "file too large"]) {
            FailureKind::DiskExhausted
        } else if any(&[
            "could not resolve host",
            "could not resolve hostname",
            "connection timed out",
            "connection refused",
            "network is unreachable",
            "failed to connect",
            "unable to access",
            "the remote end hung up",
            "early eof",
            "operation timed out",
            "ssl_connect",
            "gnutls",
        ]) {
            FailureKind::Network
        } else if any(&[
            "permission denied",
            "operation not permitted",
            "read-only file system",
        ]) {
            FailureKind::Permission
        } else {
            FailureKind::Unknown
        }
    }

    pub fn remedies(&self) -> Vec<String> {
        let steps: &[&str] = match self {
            FailureKind::Permission => &[
                "Check that you own the cache directory and can write to it.",
                "Point CORPUS_CACHE_DIR at a writable location.",
            ],
            FailureKind::Network => &[
                "Check your network connection and proxy settings.",
                "Confirm the remote host resolves and is reachable.",
                "Run the command again once the connection is stable.",
            ],
            FailureKind::Auth => &[
                "Confirm your account has read access to the corpus repository.",
                "Configure git credentials (SSH key or credential helper) for the remote.",
                "Test access with `git ls-remote <remote>`.",
            ],
            FailureKind::LockContention => &[
                "Wait for the other corpus or git process to finish.",
                "If none is running, delete stale `*.lock` files under <cache>/sessions.",
            ],
            FailureKind::DiskExhausted => &[
                "Free disk space on the volume holding the cache.",
                "Run `corpus cache prune` or `corpus cache clear`.",
                "Point CORPUS_CACHE_DIR at a larger volume.",
            ],
            FailureKind::Unknown => &[
                "Re-run with -v to see git's full output.",
                "Verify the remote URL and version reference are correct.",
            ],
        };
        steps.iter().map(|s| s.to_string()).collect()
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Permission => "permission denied",
            FailureKind::Network => "network error",
            FailureKind::Auth => "authentication failed",
            FailureKind::LockContention => "lock contention",
            FailureKind::DiskExhausted => "disk exhausted",
            FailureKind::Unknown => "unclassified failure",
        };
        f.write_str(label)
    }
}

/// All errors that can arise from transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The VCS binary could not be executed.
    #[error("`{binary}` is not installed or not on PATH")]
    Unavailable { binary: String },

    /// A transport command exited unsuccessfully.
    #[error("git {operation} failed: {kind} ({}): {}", status_label(.status), first_line(.stderr))]
    CommandFailed {
        operation: String,
        status: Option<i32>,
        kind: FailureKind,
        /// Raw stderr, untouched.
        stderr: String,
        dir: PathBuf,
    },

    #[error("git {operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    #[error("invalid sparse-checkout path '{pattern}': {reason}")]
    InvalidPath {
        pattern: String,
        reason: &'static str,
    },

    #[error("invalid remote reference '{remote}': {reason}")]
    InvalidRemoteReference {
        remote: String,
        reason: &'static str,
    },

    #[error("invalid version reference '{reference}': {reason}")]
    InvalidVersionReference {
        reference: String,
        reason: &'static str,
    },

    #[error("no sparse-checkout session is open for {operation}")]
    NoSession { operation: &'static str },

    /// An I/O error, annotated with the operation and path.
    #[error("I/O error during {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Raw diagnostic output, when the error came from a command.
    pub fn raw_diagnostic(&self) -> Option<&str> {
        match self {
            TransportError::CommandFailed { stderr, .. } if !stderr.trim().is_empty() => {
                Some(stderr.as_str())
            }
            _ => None,
        }
    }
}

/// Convenience constructor for [`TransportError::Io`].
pub(crate) fn io_err(
    operation: &'static str,
    path: impl Into<PathBuf>,
    source: std::io::Error,
) -> TransportError {
    TransportError::Io {
        operation,
        path: path.into(),
        source,
    }
}

fn status_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no diagnostic output")
}

impl Remedy for TransportError {
    fn diagnosis(&self) -> String {
        self.to_string()
    }

    fn remedies(&self) -> Vec<String> {
        match self {
            TransportError::Unavailable { binary } => vec![
                format!("Install {binary} (https://git-scm.com/downloads)."),
                format!("Make sure `{binary}` is on PATH."),
                format!("Verify with `{binary} --version`."),
            ],
            TransportError::CommandFailed { kind, .. } => kind.remedies(),
            TransportError::Timeout { .. } => vec![
                "Check your network connection.".to_string(),
                "Raise CORPUS_TRANSPORT_TIMEOUT_SECS for slow links.".to_string(),
            ],
            TransportError::InvalidPath { .. } => vec![
                "Use relative patterns without spaces, leading `/` or `../`.".to_string(),
            ],
            TransportError::InvalidRemoteReference { .. } => vec![
                "Pass a git URL or path via --remote, CORPUS_REMOTE or `.corpus.yaml`.".to_string(),
            ],
            TransportError::InvalidVersionReference { .. } => vec![
                "Pass a branch, tag or commit via --ref.".to_string(),
                "Omit --ref to use the upstream default branch.".to_string(),
            ],
            TransportError::NoSession { .. } => vec![
                "This is a bug: report it with the output of -v.".to_string(),
            ],
            TransportError::Io { path, .. } => vec![
                format!("Check permissions and free space at {}.", path.display()),
            ],
        }
    }
}
