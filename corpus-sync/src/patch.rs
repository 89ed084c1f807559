//! Unified diffs for `corpus diff --patch`.

use serde::Serialize;
use similar::TextDiff;

use corpus_core::RelPath;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePatch {
    pub path: RelPath,
    pub unified_diff: String,
}

/// Render `before` → `after` with `a/`/`b/` headers and three lines of
/// context. Non-UTF-8 content gets a one-line binary notice instead.
pub fn render(path: &RelPath, before: &[u8], after: &[u8]) -> FilePatch {
    let old_header = format!("a/{path}");
    let new_header = format!("b/{path}");

    let unified_diff = match (std::str::from_utf8(before), std::str::from_utf8(after)) {
        (Ok(old), Ok(new)) => TextDiff::from_lines(old, new)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string(),
        _ => format!("Binary files {old_header} and {new_header} differ\n"),
    };

    FilePatch {
        path: path.clone(),
        unified_diff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_change_produces_unified_hunk() {
        let path = RelPath::new("core/rules.md").unwrap();
        let patch = render(&path, b"one\ntwo\nthree\n", b"one\n2\nthree\n");
        assert!(patch.unified_diff.contains("--- a/core/rules.md"));
        assert!(patch.unified_diff.contains("+++ b/core/rules.md"));
        assert!(patch.unified_diff.contains("-two"));
        assert!(patch.unified_diff.contains("+2"));
    }

    #[test]
    fn new_file_diffs_against_empty() {
        let path = RelPath::new("core/new.md").unwrap();
        let patch = render(&path, b"", b"hello\n");
        assert!(patch.unified_diff.contains("+hello"));
    }

    #[test]
    fn binary_content_is_not_rendered() {
        let path = RelPath::new("core/logo.png").unwrap();
        let patch = render(&path, &[0xff, 0xfe, 0x00], b"text");
        assert_eq!(
            patch.unified_diff,
            "Binary files a/core/logo.png and b/core/logo.png differ\n"
        );
    }
}
