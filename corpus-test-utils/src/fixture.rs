//! [`CorpusFixture`]: an upstream corpus, a consumer target and a cache root
//! side by side in one temporary directory.

use std::fs;
use std::path::{Path, PathBuf};

use corpus_core::Settings;
use tempfile::TempDir;

use crate::fake::FakeTransport;

/// Remote URL used with [`FakeTransport`]; the fake ignores it.
pub const FAKE_REMOTE: &str = "https://corpus.example.com/corpus.git";

/// # Example
///
/// ```rust,no_run
/// use corpus_test_utils::CorpusFixture;
///
/// let fx = CorpusFixture::new();
/// fx.write_upstream("core/rules.md", "be kind\n");
/// let mut transport = fx.transport();
/// let settings = fx.settings();
/// ```
pub struct CorpusFixture {
    temp_dir: TempDir,
}

impl Default for CorpusFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusFixture {
    pub fn new() -> Self {
        let fx = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        fs::create_dir_all(fx.upstream()).unwrap();
        fs::create_dir_all(fx.target()).unwrap();
        fx
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn upstream(&self) -> PathBuf {
        self.root().join("upstream")
    }

    pub fn target(&self) -> PathBuf {
        self.root().join("target")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root().join("cache")
    }

    /// Defaults rooted at [`Self::cache_dir`] with [`FAKE_REMOTE`] configured.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::with_cache_dir(self.cache_dir());
        settings.remote_url = Some(FAKE_REMOTE.to_string());
        settings
    }

    pub fn transport(&self) -> FakeTransport {
        FakeTransport::new(self.upstream())
    }

    pub fn write_upstream(&self, rel: &str, content: &str) {
        write(&self.upstream().join(rel), content);
    }

    pub fn remove_upstream(&self, rel: &str) {
        fs::remove_file(self.upstream().join(rel))
            .unwrap_or_else(|e| panic!("remove_upstream {rel}: {e}"));
    }

    pub fn write_target(&self, rel: &str, content: &str) {
        write(&self.target().join(rel), content);
    }

    pub fn read_target(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.target().join(rel)).ok()
    }

    /// Copy the whole upstream tree into the settings' source mirror, as a
    /// previous fetch would have.
    pub fn seed_source_mirror(&self, settings: &Settings) {
        copy_tree(&self.upstream(), &settings.source_dir);
    }

    /// Assert that `rel` under the target holds exactly `expected`.
    ///
    /// # Panics
    /// Panics with both contents when they differ.
    pub fn assert_target(&self, rel: &str, expected: &str) {
        let actual = self.read_target(rel);
        assert_eq!(
            actual.as_deref(),
            Some(expected),
            "target file {rel} has unexpected content"
        );
    }

    pub fn assert_target_missing(&self, rel: &str) {
        let path = self.target().join(rel);
        assert!(!path.exists(), "expected {} to be absent", path.display());
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap_or_else(|e| panic!("write {}: {e}", path.display()));
}

fn copy_tree(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let dest = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &dest);
        } else {
            fs::copy(entry.path(), dest).unwrap();
        }
    }
}
