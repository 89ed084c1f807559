//! Input checks applied before any argument reaches a git command line.

use crate::error::TransportError;

/// Validate every pattern; the first offender is reported.
pub fn validate_patterns(patterns: &[String]) -> Result<(), TransportError> {
    patterns.iter().try_for_each(|p| validate_pattern(p))
}

pub fn validate_pattern(pattern: &str) -> Result<(), TransportError> {
    let reject = |reason| {
        Err(TransportError::InvalidPath {
            pattern: pattern.to_string(),
            reason,
        })
    };

    if pattern.is_empty() {
        return reject("pattern is empty");
    }
    if pattern.chars().any(char::is_whitespace) {
        return reject("patterns must not contain spaces");
    }
    if pattern.starts_with('/') || pattern.starts_with('\\') {
        return reject("patterns must be relative");
    }
    if pattern == ".." || pattern.starts_with("../") || pattern.contains("/../") || pattern.ends_with("/..") {
        return reject("patterns must not climb out of the checkout with `../`");
    }
    if pattern.starts_with('!') || pattern.starts_with('#') {
        return reject("negated and comment patterns are not supported");
    }
    Ok(())
}

pub fn validate_remote(remote: &str) -> Result<(), TransportError> {
    let reject = |reason| {
        Err(TransportError::InvalidRemoteReference {
            remote: remote.to_string(),
            reason,
        })
    };

    if remote.is_empty() {
        return reject("remote is empty");
    }
    if remote.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return reject("remote must not contain whitespace");
    }
    if remote.starts_with('-') {
        return reject("remote must not start with `-`");
    }
    Ok(())
}

/// Follows the rules of `git check-ref-format`, loosened to accept bare
/// commit ids and single-level names such as `main`.
pub fn validate_version_ref(reference: &str) -> Result<(), TransportError> {
    let reject = |reason| {
        Err(TransportError::InvalidVersionReference {
            reference: reference.to_string(),
            reason,
        })
    };

    if reference.is_empty() {
        return reject("reference is empty");
    }
    if reference.starts_with('-') {
        return reject("reference must not start with `-`");
    }
    if reference.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return reject("reference must not contain whitespace or control characters");
    }
    if reference.contains("..") {
        return reject("reference must not contain `..`");
    }
    if reference.contains("@{") {
        return reject("reference must not contain `@{`");
    }
    if reference.chars().any(|c| matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\')) {
        return reject("reference contains a character git forbids");
    }
    if reference.starts_with('/') || reference.ends_with('/') || reference.contains("//") {
        return reject("reference has an empty path component");
    }
    if reference.ends_with('.') || reference.ends_with(".lock") {
        return reject("reference must not end with `.` or `.lock`");
    }
    if reference.split('/').any(|part| part.starts_with('.')) {
        return reject("reference components must not start with `.`");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("core/")]
    #[case("agents/")]
    #[case("core/rules.md")]
    #[case("docs/*.md")]
    #[case("a..b/")]
    fn accepts_relative_patterns(#[case] pattern: &str) {
        assert!(validate_pattern(pattern).is_ok(), "{pattern}");
    }

    #[rstest]
    #[case("")]
    #[case("core dir/")]
    #[case("core/\nagents/")]
    #[case("/etc/")]
    #[case("../outside/")]
    #[case("core/../../x")]
    #[case("..")]
    #[case("!core/")]
    fn rejects_unsafe_patterns(#[case] pattern: &str) {
        assert!(matches!(
            validate_pattern(pattern),
            Err(TransportError::InvalidPath { .. })
        ));
    }

    #[test]
    fn batch_validation_names_the_offender() {
        let patterns = vec!["core/".to_string(), "bad path/".to_string()];
        match validate_patterns(&patterns) {
            Err(TransportError::InvalidPath { pattern, .. }) => assert_eq!(pattern, "bad path/"),
            other => panic!("expected InvalidPath, got {other:?}"),
        }
    }

    #[rstest]
    #[case("https://example.com/org/corpus.git")]
    #[case("git@example.com:org/corpus.git")]
    #[case("/srv/git/corpus")]
    #[case("file:///srv/git/corpus")]
    fn accepts_remotes(#[case] remote: &str) {
        assert!(validate_remote(remote).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("--upload-pack=evil")]
    #[case("https://example.com/a b.git")]
    fn rejects_remotes(#[case] remote: &str) {
        assert!(matches!(
            validate_remote(remote),
            Err(TransportError::InvalidRemoteReference { .. })
        ));
    }

    #[rstest]
    #[case("main")]
    #[case("v1.2.0")]
    #[case("release/2024-06")]
    #[case("3f2a9c1d0e")]
    fn accepts_version_refs(#[case] reference: &str) {
        assert!(validate_version_ref(reference).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("-b")]
    #[case("main..dev")]
    #[case("HEAD~1")]
    #[case("v1^")]
    #[case("a:b")]
    #[case("feat/")]
    #[case("topic.lock")]
    #[case("has space")]
    #[case(".hidden")]
    #[case("main@{1}")]
    fn rejects_version_refs(#[case] reference: &str) {
        assert!(matches!(
            validate_version_ref(reference),
            Err(TransportError::InvalidVersionReference { .. })
        ));
    }
}
