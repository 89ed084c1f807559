//! Runtime settings and the per-project `.corpus.yaml` file.
//!
//! # Storage layout
//!
//! ```text
//! <cache_dir>/
//!   blobs/<aa>/<digest>     (content cache)
//!   state/<project-key>.json (last successful sync per target)
//!   source/<category>/...    (local source mirror)
//!   sessions/fetch-*/        (ephemeral sparse checkouts)
//! ```
//!
//! # API pattern
//!
//! [`Settings::from_lookup`] takes the environment as a closure and the
//! platform cache directory as a value; used in tests. [`Settings::from_env`]
//! reads the real process environment and delegates. Settings are resolved
//! once in `main` and passed down explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Category;

pub const ENV_CACHE_DIR: &str = "CORPUS_CACHE_DIR";
pub const ENV_SOURCE_DIR: &str = "CORPUS_SOURCE_DIR";
pub const ENV_REMOTE: &str = "CORPUS_REMOTE";
pub const ENV_REF: &str = "CORPUS_REF";
pub const ENV_CATEGORIES: &str = "CORPUS_CATEGORIES";
pub const ENV_CACHE_THRESHOLD: &str = "CORPUS_CACHE_THRESHOLD";
pub const ENV_CACHE_MAX_BYTES: &str = "CORPUS_CACHE_MAX_BYTES";
pub const ENV_TRANSPORT_TIMEOUT: &str = "CORPUS_TRANSPORT_TIMEOUT_SECS";

pub const DEFAULT_CACHE_THRESHOLD: f64 = 0.8;
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 256 * 1024 * 1024;
pub const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(300);

/// File name of the optional per-project config inside a target directory.
pub const PROJECT_CONFIG_FILE: &str = ".corpus.yaml";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Root of blobs, sync state, the source mirror and fetch sessions.
    pub cache_dir: PathBuf,
    /// Local copy of the corpus used to decide whether a fetch is needed.
    pub source_dir: PathBuf,
    pub remote_url: Option<String>,
    /// `None` fetches the upstream default branch.
    pub version_ref: Option<String>,
    pub categories: Vec<Category>,
    /// Minimum cache hit ratio at which a sync skips the transport.
    pub cache_threshold: f64,
    pub cache_max_bytes: u64,
    pub transport_timeout: Duration,
}

impl Settings {
    /// Defaults rooted at `cache_dir`, with no remote configured.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        Self {
            source_dir: cache_dir.join("source"),
            cache_dir,
            remote_url: None,
            version_ref: None,
            categories: Category::defaults(),
            cache_threshold: DEFAULT_CACHE_THRESHOLD,
            cache_max_bytes: DEFAULT_CACHE_MAX_BYTES,
            transport_timeout: DEFAULT_TRANSPORT_TIMEOUT,
        }
    }

    /// Resolve settings from `lookup` (an environment accessor).
    ///
    /// `platform_cache` is the per-user cache root (`dirs::cache_dir()`);
    /// the corpus cache lives in its `corpus` subdirectory unless
    /// `CORPUS_CACHE_DIR` says otherwise. Malformed numeric values fall back
    /// to their defaults with a warning instead of failing.
    pub fn from_lookup<F>(lookup: F, platform_cache: Option<PathBuf>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cache_dir = match get(ENV_CACHE_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => platform_cache
                .map(|p| p.join("corpus"))
                .ok_or(ConfigError::NoCacheDir)?,
        };

        let mut settings = Self::with_cache_dir(cache_dir);
        if let Some(dir) = get(ENV_SOURCE_DIR) {
            settings.source_dir = PathBuf::from(dir);
        }
        settings.remote_url = get(ENV_REMOTE).map(|v| v.trim().to_string());
        settings.version_ref = get(ENV_REF).map(|v| v.trim().to_string());
        if let Some(raw) = get(ENV_CATEGORIES) {
            settings.categories = parse_categories(&raw);
        }
        settings.cache_threshold = parse_threshold(get(ENV_CACHE_THRESHOLD).as_deref());
        settings.cache_max_bytes = parse_max_bytes(get(ENV_CACHE_MAX_BYTES).as_deref());
        settings.transport_timeout = parse_timeout(get(ENV_TRANSPORT_TIMEOUT).as_deref());
        Ok(settings)
    }

    /// `from_lookup` over the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let platform_cache =
            dirs::cache_dir().or_else(|| dirs::home_dir().map(|home| home.join(".cache")));
        Self::from_lookup(|key| std::env::var(key).ok(), platform_cache)
    }

    /// Overlay values from a project's `.corpus.yaml`.
    pub fn apply_project(&mut self, project: &ProjectConfig) {
        if let Some(remote) = &project.remote {
            self.remote_url = Some(remote.clone());
        }
        if let Some(version_ref) = &project.version_ref {
            self.version_ref = Some(version_ref.clone());
        }
        if !project.categories.is_empty() {
            self.categories = project.categories.clone();
        }
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.cache_dir.join("blobs")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.cache_dir.join("state")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.cache_dir.join("sessions")
    }
}

/// Accept a threshold in `[0, 1]`; anything else yields `None`.
pub fn validate_threshold(value: f64) -> Option<f64> {
    (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(value)
}

/// Parse a threshold string, falling back to [`DEFAULT_CACHE_THRESHOLD`].
pub fn parse_threshold(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return DEFAULT_CACHE_THRESHOLD;
    };
    match raw.trim().parse::<f64>().ok().and_then(validate_threshold) {
        Some(value) => value,
        None => {
            tracing::warn!(
                value = raw,
                default = DEFAULT_CACHE_THRESHOLD,
                "invalid cache threshold, using default"
            );
            DEFAULT_CACHE_THRESHOLD
        }
    }
}

fn parse_max_bytes(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else {
        return DEFAULT_CACHE_MAX_BYTES;
    };
    match raw.trim().parse::<u64>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(value = raw, "invalid cache capacity, using default");
            DEFAULT_CACHE_MAX_BYTES
        }
    }
}

fn parse_timeout(raw: Option<&str>) -> Duration {
    let Some(raw) = raw else {
        return DEFAULT_TRANSPORT_TIMEOUT;
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            tracing::warn!(value = raw, "invalid transport timeout, using default");
            DEFAULT_TRANSPORT_TIMEOUT
        }
    }
}

/// Split a comma-separated category list, dropping invalid names.
pub fn parse_categories(raw: &str) -> Vec<Category> {
    let mut categories = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match Category::new(name) {
            Ok(category) if !categories.contains(&category) => categories.push(category),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "ignoring category"),
        }
    }
    if categories.is_empty() {
        return Category::defaults();
    }
    categories
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

/// Optional `.corpus.yaml` at the root of a consumer project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub version_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
}

impl ProjectConfig {
    pub fn path_at(target: &Path) -> PathBuf {
        target.join(PROJECT_CONFIG_FILE)
    }

    /// Load `<target>/.corpus.yaml`; `Ok(None)` when the file is absent.
    pub fn load_at(target: &Path) -> Result<Option<Self>, ConfigError> {
        let path = Self::path_at(target);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        if contents.trim().is_empty() {
            return Ok(Some(Self::default()));
        }
        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|source| ConfigError::Parse { path, source })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_derive_from_platform_cache() {
        let settings = Settings::from_lookup(lookup(&[]), Some(PathBuf::from("/c"))).unwrap();
        assert_eq!(settings.cache_dir, PathBuf::from("/c/corpus"));
        assert_eq!(settings.source_dir, PathBuf::from("/c/corpus/source"));
        assert_eq!(settings.cache_threshold, DEFAULT_CACHE_THRESHOLD);
        assert_eq!(settings.transport_timeout, DEFAULT_TRANSPORT_TIMEOUT);
        assert_eq!(settings.categories, Category::defaults());
        assert!(settings.remote_url.is_none());
    }

    #[test]
    fn env_overrides_every_field() {
        let settings = Settings::from_lookup(
            lookup(&[
                (ENV_CACHE_DIR, "/tmp/cc"),
                (ENV_SOURCE_DIR, "/tmp/src"),
                (ENV_REMOTE, "https://example.com/corpus.git"),
                (ENV_REF, "v2"),
                (ENV_CATEGORIES, "core, agents"),
                (ENV_CACHE_THRESHOLD, "0.5"),
                (ENV_CACHE_MAX_BYTES, "1024"),
                (ENV_TRANSPORT_TIMEOUT, "9"),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/cc"));
        assert_eq!(settings.source_dir, PathBuf::from("/tmp/src"));
        assert_eq!(
            settings.remote_url.as_deref(),
            Some("https://example.com/corpus.git")
        );
        assert_eq!(settings.version_ref.as_deref(), Some("v2"));
        assert_eq!(settings.categories.len(), 2);
        assert_eq!(settings.cache_threshold, 0.5);
        assert_eq!(settings.cache_max_bytes, 1024);
        assert_eq!(settings.transport_timeout, Duration::from_secs(9));
    }

    #[test]
    fn missing_cache_root_is_an_error() {
        let err = Settings::from_lookup(lookup(&[]), None).unwrap_err();
        assert!(matches!(err, ConfigError::NoCacheDir));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let settings = Settings::from_lookup(
            lookup(&[
                (ENV_CACHE_DIR, "/tmp/cc"),
                (ENV_CACHE_THRESHOLD, "1.5"),
                (ENV_CACHE_MAX_BYTES, "lots"),
                (ENV_TRANSPORT_TIMEOUT, "0"),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(settings.cache_threshold, DEFAULT_CACHE_THRESHOLD);
        assert_eq!(settings.cache_max_bytes, DEFAULT_CACHE_MAX_BYTES);
        assert_eq!(settings.transport_timeout, DEFAULT_TRANSPORT_TIMEOUT);
    }

    #[test]
    fn threshold_parsing_rejects_nan_and_negatives() {
        assert_eq!(parse_threshold(Some("NaN")), DEFAULT_CACHE_THRESHOLD);
        assert_eq!(parse_threshold(Some("-0.1")), DEFAULT_CACHE_THRESHOLD);
        assert_eq!(parse_threshold(Some("abc")), DEFAULT_CACHE_THRESHOLD);
        assert_eq!(parse_threshold(Some("0")), 0.0);
        assert_eq!(parse_threshold(Some("1")), 1.0);
        assert_eq!(parse_threshold(None), DEFAULT_CACHE_THRESHOLD);
    }

    #[test]
    fn category_list_dedups_and_skips_invalid() {
        let cats = parse_categories("core,core, bad name ,agents");
        let names: Vec<&str> = cats.iter().map(Category::as_str).collect();
        assert_eq!(names, vec!["core", "agents"]);
        assert_eq!(parse_categories(" , "), Category::defaults());
    }

    #[test]
    fn blank_project_config_changes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(ProjectConfig::path_at(dir.path()), "\n  \n").unwrap();

        let project = ProjectConfig::load_at(dir.path()).unwrap().unwrap();
        assert_eq!(project, ProjectConfig::default());

        let mut settings = Settings::with_cache_dir(dir.path());
        let before = settings.clone();
        settings.apply_project(&project);
        assert_eq!(settings, before);
    }

    #[test]
    fn unreadable_project_config_is_an_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        // A directory where the file should be cannot be read as text.
        std::fs::create_dir(ProjectConfig::path_at(dir.path())).unwrap();
        let err = ProjectConfig::load_at(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn project_config_overrides_settings() {
        let mut settings = Settings::with_cache_dir("/c");
        settings.remote_url = Some("env-remote".into());
        let project = ProjectConfig {
            remote: Some("project-remote".into()),
            version_ref: None,
            categories: vec![Category::new("agents").unwrap()],
        };
        settings.apply_project(&project);
        assert_eq!(settings.remote_url.as_deref(), Some("project-remote"));
        assert!(settings.version_ref.is_none());
        assert_eq!(settings.categories[0].as_str(), "agents");
    }
}
