//! Changelog parser. Following <https://keepachangelog.com/en/1.0.0/>.
//!
//! A release section starts with a level-2 heading carrying a semantic
//! version (optionally bracketed, optionally linked), an optional
//! prerelease or build-metadata suffix, and a 10-character date. The body
//! runs until the next `##` marker, so `###` subsections end the captured
//! text on purpose.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Header grammar applied to each `##` segment of the document.
///
/// The regex crate has no lookaround, so instead of matching
/// `(?<=##)...(?=##|\z)` over the whole document the parser splits on `##`
/// and anchors this pattern to each segment; the trailing capture is the
/// section body.
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\A\s*\[*(v?0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)\]?(\(.*\))?(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?\]*\s-\s*([\d\-/]{10})(.*)\z",
    )
    .expect("changelog header pattern is valid")
});

/// One release section extracted from the changelog.
///
/// Field layout mirrors the capture groups of the header grammar; optional
/// groups that did not participate are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionNote {
    /// Major component, including the `v` prefix when the tag carries one.
    pub major: String,
    /// Minor component.
    pub minor: String,
    /// Patch component.
    pub patch: String,
    /// Parenthesized comparison-link fragment, when present.
    pub url: Option<String>,
    /// Prerelease identifier (`-beta1`), when present.
    pub prerelease: Option<String>,
    /// Build metadata (`+build5`), when present.
    pub build: Option<String>,
    /// Raw 10-character date token (`2021-02-08` or `2021/02/08`).
    pub date: String,
    /// Section body as captured, untrimmed.
    pub text_raw: String,
}

impl VersionNote {
    /// Version string: `major.minor.patch`, suffixed with `-prerelease`.
    pub fn version(&self) -> String {
        match self.prerelease.as_deref() {
            Some(pre) if !pre.is_empty() => {
                format!("{}.{}.{}-{}", self.major, self.minor, self.patch, pre)
            }
            _ => format!("{}.{}.{}", self.major, self.minor, self.patch),
        }
    }

    /// Section body without leading/trailing whitespace; `None` when empty.
    pub fn text(&self) -> Option<&str> {
        let trimmed = self.text_raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    /// Whether this release carries a prerelease identifier.
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Ordered, immutable sequence of release sections (newest first, as they
/// appear in the document).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLog {
    versions: Vec<VersionNote>,
}

impl ChangeLog {
    /// Parse a changelog file.
    ///
    /// The caller is responsible for checking that the file exists; a read
    /// failure is the only error this can produce.
    pub fn parse(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse_text(&content))
    }

    /// Parse changelog text. Never fails: malformed or missing headers are
    /// simply absent from the result.
    pub fn parse_text(content: &str) -> Self {
        let mut versions = Vec::new();

        // Each candidate section starts right after a `##` marker and ends
        // at the next one, which also cuts bodies at `###` subsections.
        for segment in content.split("##").skip(1) {
            if let Some(caps) = HEADER_RE.captures(segment) {
                versions.push(VersionNote {
                    major: caps[1].to_string(),
                    minor: caps[2].to_string(),
                    patch: caps[3].to_string(),
                    url: caps.get(4).map(|m| m.as_str().to_string()),
                    prerelease: caps.get(5).map(|m| m.as_str().to_string()),
                    build: caps.get(6).map(|m| m.as_str().to_string()),
                    date: caps[7].to_string(),
                    text_raw: caps[8].to_string(),
                });
            }
        }

        Self { versions }
    }

    /// Whether the changelog holds no release sections.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Number of release sections.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Release sections in document order.
    pub fn versions(&self) -> &[VersionNote] {
        &self.versions
    }

    /// Find a release by tag.
    ///
    /// `"latest"` returns the first entry. Any other tag is compared by
    /// exact string equality against [`VersionNote::version`]; semver-aware
    /// matching belongs to the layer above.
    pub fn find(&self, tag: &str) -> Option<&VersionNote> {
        if tag == "latest" {
            return self.versions.first();
        }

        self.versions.iter().find(|v| v.version() == tag)
    }

    /// The most recent release, if any.
    pub fn latest(&self) -> Option<&VersionNote> {
        self.find("latest")
    }

    /// Content to add to the `changelog` key of `metadata.txt`: the first
    /// `count` entries rendered as `Version x.y.z:` blocks, with a single
    /// leading newline. Empty changelog renders as `""`.
    pub fn format_last_items(&self, count: usize) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut output = String::from("\n");

        for version in self.versions.iter().take(count) {
            output.push_str(&format!("Version {}:\n", version.version()));
            if let Some(text) = version.text() {
                output.push_str(text);
            }
            output.push_str("\n\n");
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"# Changelog

All notable changes to this project are documented in this file.

## Unreleased

- Not yet released, never parsed

## [10.1.0-beta1] - 2021/02/08

- This is the latest documented version in this changelog
- The changelog module is tested against these lines
- Be careful modifying this file

## [10.1.0-alpha1] - 2021/02/08

- This is a version with a prerelease in this changelog
- The changelog module is tested against these lines
- Be careful modifying this file

### Fixed

- trying with a subsection in a version note

## 10.0.1 - 2021/01/01

- End of year version

## 10.0.0 - 2020/12/31

- A
- B
- C

## 9.10.1 - 2020/12/30

- D
- E
- F

## v0.1.1 - 2020/01/02

* Tag with a "v" prefix to check the regular expression
* Previous version

## 0.1.0 - 2020/01/01

* Very old version
"#;

    #[test]
    fn test_parse_counts_versions_and_skips_unreleased() {
        let changelog = ChangeLog::parse_text(FIXTURE);
        assert_eq!(changelog.len(), 7);
        assert!(!changelog.is_empty());
        // The Unreleased section never matches the header grammar
        assert!(changelog.versions().iter().all(|v| !v.text_raw.contains("never parsed")));
    }

    #[test]
    fn test_find_exact_versions() {
        let changelog = ChangeLog::parse_text(FIXTURE);

        let expected = [
            (
                "10.1.0-beta1",
                "- This is the latest documented version in this changelog\n\
                 - The changelog module is tested against these lines\n\
                 - Be careful modifying this file",
            ),
            (
                "10.1.0-alpha1",
                "- This is a version with a prerelease in this changelog\n\
                 - The changelog module is tested against these lines\n\
                 - Be careful modifying this file",
            ),
            ("10.0.1", "- End of year version"),
            ("10.0.0", "- A\n- B\n- C"),
            ("9.10.1", "- D\n- E\n- F"),
            (
                "v0.1.1",
                "* Tag with a \"v\" prefix to check the regular expression\n* Previous version",
            ),
            ("0.1.0", "* Very old version"),
        ];

        for (tag, text) in expected {
            let note = changelog.find(tag).unwrap_or_else(|| panic!("missing {tag}"));
            assert_eq!(note.version(), tag);
            assert_eq!(note.text(), Some(text), "text mismatch for {tag}");
        }
    }

    #[test]
    fn test_find_unknown_version() {
        let changelog = ChangeLog::parse_text(FIXTURE);
        assert!(changelog.find("0.0.0").is_none());
    }

    #[test]
    fn test_find_latest() {
        let changelog = ChangeLog::parse_text(FIXTURE);
        let latest = changelog.latest().unwrap();
        assert_eq!(latest.version(), "10.1.0-beta1");
        assert_eq!(changelog.find("latest"), changelog.find("10.1.0-beta1"));
    }

    #[test]
    fn test_version_note_fields() {
        let changelog = ChangeLog::parse_text(FIXTURE);
        let note = changelog.find("10.1.0-beta1").unwrap();

        assert_eq!(note.major, "10");
        assert_eq!(note.minor, "1");
        assert_eq!(note.patch, "0");
        assert_eq!(note.url, None);
        assert_eq!(note.prerelease.as_deref(), Some("beta1"));
        assert_eq!(note.build, None);
        assert_eq!(note.date, "2021/02/08");
        assert!(note.is_prerelease());

        let note = changelog.find("10.0.1").unwrap();
        assert_eq!(note.prerelease, None);
        assert!(!note.is_prerelease());
        assert_eq!(note.date, "2021/01/01");
    }

    #[test]
    fn test_unreleased_then_single_release() {
        let content = "## Unreleased\n\n- wip\n\n## 10.0.1 - 2021/01/01\n- End of year version";
        let changelog = ChangeLog::parse_text(content);
        assert_eq!(changelog.len(), 1);
        assert_eq!(changelog.find("10.0.1").unwrap().text(), Some("- End of year version"));
    }

    #[test]
    fn test_empty_and_headerless_documents() {
        assert!(ChangeLog::parse_text("").is_empty());
        assert!(ChangeLog::parse_text("# Changelog\n\nnothing here\n").is_empty());
        assert_eq!(ChangeLog::parse_text("").format_last_items(3), "");
        assert!(ChangeLog::parse_text("").find("latest").is_none());
    }

    #[test]
    fn test_near_miss_headers_are_excluded() {
        // Two-component version and missing date must not match
        let content = "## 1.0 - 2021/01/01\n- a\n\n## 1.0.0\n- b\n\n## 2.0.0 - 2021/01/02\n- c\n";
        let changelog = ChangeLog::parse_text(content);
        assert_eq!(changelog.len(), 1);
        assert_eq!(changelog.latest().unwrap().version(), "2.0.0");
    }

    #[test]
    fn test_build_metadata_suffix() {
        let content = "## 1.2.3+build5 - 2021-03-01\n- with build metadata\n";
        let changelog = ChangeLog::parse_text(content);
        let note = changelog.find("1.2.3").unwrap();
        assert_eq!(note.build.as_deref(), Some("build5"));
        assert!(!note.is_prerelease());
        assert_eq!(note.date, "2021-03-01");
    }

    #[test]
    fn test_format_last_items_caps_count() {
        let changelog = ChangeLog::parse_text(FIXTURE);
        let output = changelog.format_last_items(3);
        assert_eq!(output.matches("Version ").count(), 3);
        assert!(output.starts_with("\nVersion 10.1.0-beta1:\n"));
        assert!(output.ends_with("\n\n"));

        // More than available renders everything
        let output = changelog.format_last_items(100);
        assert_eq!(output.matches("Version ").count(), 7);
    }

    #[test]
    fn test_format_includes_body_text() {
        let content = "## 10.0.1 - 2021/01/01\n- End of year version\n";
        let output = ChangeLog::parse_text(content).format_last_items(3);
        assert_eq!(output, "\nVersion 10.0.1:\n- End of year version\n\n");
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(ChangeLog::parse_text(FIXTURE), ChangeLog::parse_text(FIXTURE));
    }
}
