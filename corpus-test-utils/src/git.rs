//! Real git repositories for end-to-end tests.
//!
//! Tests using these should call [`git_available`] first and return early
//! when it is false.

use std::fs;
use std::path::Path;
use std::process::Command;

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir`, returning trimmed stdout.
///
/// # Panics
/// Panics with git's stderr if the command fails.
pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("run_git: failed to run `git {args:?}`: {e}"));
    if !output.status.success() {
        panic!(
            "run_git: `git {args:?}` failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Initialise `path` as an upstream corpus repository with `files`
/// committed. Returns the commit id.
pub fn corpus_repo(path: &Path, files: &[(&str, &str)]) -> String {
    fs::create_dir_all(path).unwrap();
    run_git(path, &["init", "-q"]);
    run_git(path, &["config", "user.email", "corpus@example.com"]);
    run_git(path, &["config", "user.name", "Corpus Test"]);
    run_git(path, &["config", "commit.gpgsign", "false"]);
    commit_files(path, files, "initial corpus")
}

/// Write `files`, commit everything, return the new commit id.
pub fn commit_files(path: &Path, files: &[(&str, &str)], message: &str) -> String {
    for (rel, content) in files {
        let file = path.join(rel);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file, content).unwrap();
    }
    run_git(path, &["add", "-A"]);
    run_git(path, &["commit", "-q", "-m", message]);
    run_git(path, &["rev-parse", "HEAD"])
}

/// `file://` URL for a local repository.
pub fn file_remote(path: &Path) -> String {
    format!("file://{}", path.display())
}
