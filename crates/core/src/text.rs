// crates/core/src/text.rs
//! Searchable-text extraction: readme, license, changelog.
//!
//! Files are located by a case-insensitive prefix match on top-level
//! filenames. Missing files are not errors. Text is normalized before it goes
//! anywhere near the sink: odd characters become spaces, whitespace runs
//! collapse to one space, leading space is trimmed.

use std::path::Path;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

/// Full-text block of the result document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FullText {
    pub readme: Option<String>,
    pub license: Option<String>,
    pub changelog: Option<String>,
}

/// Extract and normalize all full-text files from a clone's top level.
pub fn extract(dir: &Path) -> FullText {
    FullText {
        readme: read_matching(dir, "README"),
        license: read_matching(dir, "LICENSE"),
        changelog: read_matching(dir, "CHANGELOG"),
    }
}

/// Normalize text for indexing.
pub fn normalize(text: &str) -> String {
    static DISALLOWED: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let disallowed =
        DISALLOWED.get_or_init(|| Regex::new(r#"[^A-Za-z0-9@._'": /]"#).expect("valid pattern"));
    let spaces = SPACES.get_or_init(|| Regex::new(" +").expect("valid pattern"));

    let text = disallowed.replace_all(text, " ");
    let text = spaces.replace_all(&text, " ");
    text.trim_start().to_string()
}

/// Read the first top-level file whose name starts with `prefix`,
/// case-insensitively. Ties break by filename order so re-runs are stable.
fn read_matching(dir: &Path, prefix: &str) -> Option<String> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| {
            name.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
        .collect();
    names.sort();

    let name = names.into_iter().next()?;
    let bytes = std::fs::read(dir.join(name)).ok()?;
    Some(normalize(&String::from_utf8_lossy(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_strips_odd_characters() {
        assert_eq!(normalize("hello, world!"), "hello world");
        assert_eq!(normalize("a@b.c  d:e/f"), "a@b.c d:e/f");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("a   b\n\nc\td"), "a b c d");
    }

    #[test]
    fn test_normalize_trims_leading_space() {
        assert_eq!(normalize("  # Title"), "Title");
    }

    #[test]
    fn test_extract_finds_readme_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ReadMe.md"), "# Hello\n\nworld").unwrap();

        let text = extract(dir.path());
        assert_eq!(text.readme.as_deref(), Some("Hello world"));
        assert_eq!(text.license, None);
        assert_eq!(text.changelog, None);
    }

    #[test]
    fn test_extract_license_and_changelog() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("LICENSE"), "MIT License").unwrap();
        std::fs::write(dir.path().join("changelog.txt"), "v1: stuff").unwrap();

        let text = extract(dir.path());
        assert_eq!(text.license.as_deref(), Some("MIT License"));
        assert_eq!(text.changelog.as_deref(), Some("v1: stuff"));
    }

    #[test]
    fn test_extract_missing_files_are_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(extract(dir.path()), FullText::default());
    }

    #[test]
    fn test_extract_ignores_nested_readme() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs").join("README.md"), "nested").unwrap();

        assert_eq!(extract(dir.path()).readme, None);
    }
}
