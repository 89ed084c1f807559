//! Child-process execution with a hard deadline.

use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{io_err, TransportError};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run `cmd` in `dir`, killing it once `timeout` elapses.
///
/// stdout and stderr are drained on helper threads so a chatty child
/// cannot block on a full pipe while we poll. On Unix the child leads its
/// own process group and the whole group is killed at the deadline, which
/// takes helpers such as `git-remote-https` and `ssh` down with it.
pub(crate) fn run_with_timeout(
    mut cmd: Command,
    operation: &str,
    dir: &Path,
    timeout: Duration,
) -> Result<CommandOutput, TransportError> {
    cmd.current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            TransportError::Unavailable {
                binary: cmd.get_program().to_string_lossy().into_owned(),
            }
        } else {
            io_err("spawn", dir, err)
        }
    })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                kill_tree(&mut child);
                let _ = child.wait();
                // Every writer is gone, so the drains reach EOF.
                collect(stdout);
                collect(stderr);
                tracing::warn!(operation, timeout_secs = timeout.as_secs(), "transport command timed out");
                return Err(TransportError::Timeout {
                    operation: operation.to_string(),
                    after: timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                kill_tree(&mut child);
                return Err(io_err("wait", dir, err));
            }
        }
    };

    Ok(CommandOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: plain kill(2) on the process group this function's caller
        // created with `process_group(0)`; no memory is shared.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_output_and_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2; exit 3"]);
        let out = run_with_timeout(cmd, "echo", Path::new("."), Duration::from_secs(10)).unwrap();
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn slow_command_is_killed_at_the_deadline() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let err = run_with_timeout(cmd, "fetch", Path::new("."), Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { ref operation, .. } if operation == "fetch"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn deadline_kills_background_helpers_holding_the_pipes() {
        // The backgrounded sleep keeps stdout open; killing only `sh`
        // would leave the drain thread waiting for it.
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 30 & wait"]);
        let started = Instant::now();
        let err = run_with_timeout(cmd, "fetch", Path::new("."), Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let cmd = Command::new("corpus-no-such-binary-7f3a");
        let err = run_with_timeout(cmd, "version", Path::new("."), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, TransportError::Unavailable { .. }));
    }
}
