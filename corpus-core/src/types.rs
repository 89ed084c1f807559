//! Domain types shared by every corpus crate.
//!
//! All three newtypes validate on construction and on deserialization, so a
//! value that exists is always well-formed.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::PathError;

// ---------------------------------------------------------------------------
// Digest
// ---------------------------------------------------------------------------

/// Lowercase hex SHA-256 digest of a content blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Hash `bytes` and return their digest.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Parse a 64-character hex digest. Uppercase input is lowered.
    pub fn parse(value: &str) -> Result<Self, PathError> {
        let lowered = value.trim().to_ascii_lowercase();
        if lowered.len() != 64 || !lowered.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PathError::InvalidDigest {
                value: value.to_string(),
            });
        }
        Ok(Self(lowered))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for display.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for Digest {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(d: Digest) -> Self {
        d.0
    }
}

// ---------------------------------------------------------------------------
// RelPath
// ---------------------------------------------------------------------------

/// A normalized, `/`-separated path relative to a corpus or target root.
///
/// Never empty, never absolute, and free of `.`/`..` and empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelPath(String);

impl RelPath {
    pub fn new(value: &str) -> Result<Self, PathError> {
        let invalid = |reason: &'static str| PathError::Invalid {
            path: value.to_string(),
            reason,
        };

        if value.is_empty() {
            return Err(invalid("path is empty"));
        }
        if value.starts_with('/') {
            return Err(invalid("absolute paths are not allowed"));
        }
        if value.contains('\\') {
            return Err(invalid("backslash separators are not allowed"));
        }

        let trimmed = value.strip_prefix("./").unwrap_or(value);
        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            match segment {
                "" => return Err(invalid("empty path segment")),
                "." => return Err(invalid("`.` segments are not allowed")),
                ".." => return Err(invalid("parent traversal is not allowed")),
                s => segments.push(s),
            }
        }
        Ok(Self(segments.join("/")))
    }

    /// Build from a filesystem path relative to some root.
    pub fn from_path(path: &Path) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(PathError::Invalid {
                        path: path.display().to_string(),
                        reason: "path must be relative without parent traversal",
                    })
                }
            }
        }
        Self::new(&segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading segment, which names the category the path belongs to.
    pub fn first_segment(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    pub fn in_category(&self, category: &Category) -> bool {
        self.first_segment() == category.as_str()
    }

    /// Resolve against `root` using platform separators.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, s| acc.join(s))
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for RelPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<RelPath> for String {
    fn from(p: RelPath) -> Self {
        p.0
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A named, selectively-syncable top-level directory of the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    /// Category synced when nothing else is configured.
    pub const DEFAULT: &'static str = "core";

    pub fn new(value: &str) -> Result<Self, PathError> {
        let invalid = |reason: &'static str| PathError::InvalidCategory {
            name: value.to_string(),
            reason,
        };
        if value.is_empty() {
            return Err(invalid("name is empty"));
        }
        if value == "." || value == ".." {
            return Err(invalid("`.` and `..` are not categories"));
        }
        if value.contains(['/', '\\']) {
            return Err(invalid("name must be a single directory"));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(invalid("name must not contain whitespace"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sparse-checkout pattern selecting this category's subtree.
    pub fn pattern(&self) -> String {
        format!("{}/", self.0)
    }

    pub fn defaults() -> Vec<Category> {
        vec![Category(Self::DEFAULT.to_string())]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for Category {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.0
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Path → digest snapshot of a set of tracked files.
pub type Manifest = BTreeMap<RelPath, Digest>;

/// Keep only the entries that belong to one of `categories`.
pub fn filter_manifest(manifest: &Manifest, categories: &[Category]) -> Manifest {
    manifest
        .iter()
        .filter(|(path, _)| categories.iter().any(|c| path.in_category(c)))
        .map(|(p, d)| (p.clone(), d.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_of_empty_input_is_the_well_known_value() {
        assert_eq!(
            Digest::of(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_parse_lowers_case_and_rejects_garbage() {
        let upper = Digest::of(b"x").as_str().to_ascii_uppercase();
        assert_eq!(Digest::parse(&upper).unwrap(), Digest::of(b"x"));
        assert!(Digest::parse("deadbeef").is_err());
        assert!(Digest::parse(&"z".repeat(64)).is_err());
    }

    #[test]
    fn relpath_strips_leading_dot_slash() {
        assert_eq!(RelPath::new("./core/a.md").unwrap().as_str(), "core/a.md");
    }

    #[test]
    fn relpath_category_membership() {
        let path = RelPath::new("core/nested/a.md").unwrap();
        assert_eq!(path.first_segment(), "core");
        assert!(path.in_category(&Category::new("core").unwrap()));
        assert!(!path.in_category(&Category::new("cor").unwrap()));
    }

    #[test]
    fn relpath_from_path_joins_components() {
        let p = Path::new("core").join("nested").join("a.md");
        assert_eq!(RelPath::from_path(&p).unwrap().as_str(), "core/nested/a.md");
        assert!(RelPath::from_path(Path::new("../a.md")).is_err());
    }

    #[test]
    fn relpath_to_path_roundtrips_through_from_path() {
        let rel = RelPath::new("core/x/y.md").unwrap();
        let joined = rel.to_path(Path::new("root"));
        let back = RelPath::from_path(joined.strip_prefix("root").unwrap()).unwrap();
        assert_eq!(back, rel);
    }

    #[test]
    fn category_pattern_has_trailing_slash() {
        assert_eq!(Category::new("agents").unwrap().pattern(), "agents/");
        assert_eq!(Category::defaults()[0].as_str(), "core");
    }

    #[test]
    fn filter_manifest_keeps_selected_categories() {
        let mut m = Manifest::new();
        m.insert(RelPath::new("core/a.md").unwrap(), Digest::of(b"a"));
        m.insert(RelPath::new("agents/b.md").unwrap(), Digest::of(b"b"));
        let filtered = filter_manifest(&m, &[Category::new("agents").unwrap()]);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key(&RelPath::new("agents/b.md").unwrap()));
    }
}
