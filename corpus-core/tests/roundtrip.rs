//! Validation and serialisation tests for `corpus-core` types.
//!
//! Each `#[case]` is isolated; no shared state.

use assert_fs::prelude::*;
use corpus_core::{Category, ConfigError, Digest, Manifest, ProjectConfig, RelPath};
use predicates::prelude::*;
use rstest::rstest;

// ---------------------------------------------------------------------------
// RelPath validation
// ---------------------------------------------------------------------------

#[rstest]
#[case("core/guide.md")]
#[case("core/nested/deep/file.md")]
#[case("agents/with space.md")]
#[case("core/.hidden")]
fn relpath_accepts(#[case] input: &str) {
    assert_eq!(RelPath::new(input).expect("valid").as_str(), input);
}

#[rstest]
#[case("")]
#[case("/etc/passwd")]
#[case("../escape.md")]
#[case("core/../../escape.md")]
#[case("core//double.md")]
#[case("core/./here.md")]
#[case("core/trailing/")]
#[case("core\\windows.md")]
fn relpath_rejects(#[case] input: &str) {
    assert!(RelPath::new(input).is_err(), "{input:?} should be rejected");
}

#[rstest]
#[case("core")]
#[case("agents-v2")]
#[case("snake_case")]
fn category_accepts(#[case] input: &str) {
    assert_eq!(Category::new(input).expect("valid").to_string(), input);
}

#[rstest]
#[case("")]
#[case("..")]
#[case("core/sub")]
#[case("two words")]
fn category_rejects(#[case] input: &str) {
    assert!(Category::new(input).is_err());
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

#[test]
fn manifest_json_roundtrip_is_a_flat_string_map() {
    let mut manifest = Manifest::new();
    manifest.insert(RelPath::new("core/a.md").unwrap(), Digest::of(b"a"));
    manifest.insert(RelPath::new("core/b.md").unwrap(), Digest::of(b"b"));

    let json = serde_json::to_string(&manifest).expect("serialize");
    assert!(json.starts_with("{\"core/a.md\":\""));

    let back: Manifest = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, manifest);
}

#[test]
fn manifest_rejects_traversal_keys_on_load() {
    let json = format!("{{\"../x.md\":\"{}\"}}", Digest::of(b"x"));
    assert!(serde_json::from_str::<Manifest>(&json).is_err());
}

#[test]
fn digest_rejects_short_values_on_load() {
    assert!(serde_json::from_str::<Digest>("\"abc\"").is_err());
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[test]
fn project_config_missing_file_is_none() {
    let dir = assert_fs::TempDir::new().unwrap();
    assert!(ProjectConfig::load_at(dir.path()).unwrap().is_none());
}

#[test]
fn project_config_loads_all_keys() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child(".corpus.yaml")
        .write_str("remote: https://example.com/docs.git\nref: main\ncategories: [core, agents]\n")
        .unwrap();

    let config = ProjectConfig::load_at(dir.path()).unwrap().expect("present");
    assert_eq!(config.remote.as_deref(), Some("https://example.com/docs.git"));
    assert_eq!(config.version_ref.as_deref(), Some("main"));
    assert_eq!(config.categories.len(), 2);
}

#[test]
fn project_config_roundtrips_through_yaml() {
    let config = ProjectConfig {
        remote: Some("git@example.com:docs.git".into()),
        version_ref: Some("v1.2.0".into()),
        categories: vec![Category::new("core").unwrap()],
    };
    let yaml = serde_yaml::to_string(&config).unwrap();
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child(".corpus.yaml").write_str(&yaml).unwrap();
    dir.child(".corpus.yaml")
        .assert(predicate::str::contains("ref: v1.2.0"));

    let loaded = ProjectConfig::load_at(dir.path()).unwrap().unwrap();
    assert_eq!(loaded, config);
}

#[rstest]
#[case("categories: [\"bad name\"]\n")]
#[case("unknown_key: 1\n")]
#[case("remote: [not, a, string]\n")]
fn project_config_parse_errors_carry_the_path(#[case] yaml: &str) {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child(".corpus.yaml").write_str(yaml).unwrap();

    match ProjectConfig::load_at(dir.path()) {
        Err(ConfigError::Parse { path, .. }) => assert!(path.ends_with(".corpus.yaml")),
        other => panic!("expected parse error, got {other:?}"),
    }
}
