//! Plugin `metadata.txt` parsing and rewriting.
//!
//! The ecosystem describes a plugin with an INI-style file holding a single
//! `[general]` section of `key=value` pairs; multi-line values (the embedded
//! changelog excerpt) continue on indented lines. The corpus ships no INI
//! crate, so this is a small hand parser that keeps key order so a rewritten
//! file stays diffable.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File name of the plugin metadata file.
pub const METADATA_FILE: &str = "metadata.txt";

/// Ordered view over the `[general]` section of a `metadata.txt`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFile {
    entries: Vec<(String, String)>,
}

impl MetadataFile {
    /// Read and parse a `metadata.txt` file.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Metadata(format!("cannot read {}: {e}", path.display())))?;
        Ok(Self::parse(&content))
    }

    /// Parse metadata text. Keys outside the `[general]` section are ignored.
    pub fn parse(content: &str) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        let mut in_general = false;

        for line in content.lines() {
            let trimmed = line.trim_end();

            if trimmed.trim_start().starts_with(['#', ';']) {
                continue;
            }

            if trimmed.starts_with('[') {
                in_general = trimmed.trim() == "[general]";
                continue;
            }

            if !in_general {
                continue;
            }

            // Indented lines continue the previous value
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = entries.last_mut() {
                    let continuation = trimmed.trim_start();
                    if !continuation.is_empty() {
                        if !value.is_empty() {
                            value.push('\n');
                        }
                        value.push_str(continuation);
                    }
                }
                continue;
            }

            if let Some((key, value)) = trimmed.split_once('=') {
                entries.push((key.trim().to_string(), value.trim().to_string()));
            }
        }

        Self { entries }
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Set a value, replacing an existing key or appending a new one.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    /// Remove a key; no-op when absent.
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// Write the file back to disk.
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl fmt::Display for MetadataFile {
    /// Render with multi-line values indented so they parse back.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[general]")?;
        for (key, value) in &self.entries {
            if value.contains('\n') {
                writeln!(f, "{key}={}", value.replace('\n', "\n\t"))?;
            } else {
                writeln!(f, "{key}={value}")?;
            }
        }
        Ok(())
    }
}

/// Typed view over plugin metadata, with the fields the packaging and
/// repository-index layers care about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginMetadata {
    pub name: String,
    pub author: String,
    pub email: String,
    pub description: String,
    pub qgis_minimum_version: String,
    pub qgis_maximum_version: Option<String>,
    pub icon: Option<PathBuf>,
    pub tags: Vec<String>,
    pub experimental: bool,
    pub deprecated: bool,
    pub homepage: Option<String>,
    pub tracker: Option<String>,
    pub repository: Option<String>,
}

impl PluginMetadata {
    /// Read typed metadata from the plugin directory.
    pub fn read(plugin_path: &Path) -> Result<Self> {
        let file = MetadataFile::read(&plugin_path.join(METADATA_FILE))?;
        Self::from_file(&file)
    }

    /// Build the typed view from a parsed metadata file.
    pub fn from_file(file: &MetadataFile) -> Result<Self> {
        let name = file
            .get("name")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Metadata("missing required key 'name'".to_string()))?;
        let qgis_minimum_version = file
            .get("qgisMinimumVersion")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Metadata("missing required key 'qgisMinimumVersion'".to_string()))?;

        Ok(Self {
            name: name.to_string(),
            author: file.get("author").unwrap_or_default().to_string(),
            email: file.get("email").unwrap_or_default().to_string(),
            description: file.get("description").unwrap_or_default().to_string(),
            qgis_minimum_version: qgis_minimum_version.to_string(),
            qgis_maximum_version: file.get("qgisMaximumVersion").map(String::from),
            icon: file.get("icon").map(PathBuf::from),
            tags: parse_tags(file.get("tags").unwrap_or_default()),
            experimental: parse_bool(file.get("experimental")),
            deprecated: parse_bool(file.get("deprecated")),
            homepage: file.get("homepage").map(String::from),
            tracker: file.get("tracker").map(String::from),
            repository: file.get("repository").map(String::from),
        })
    }
}

/// Comma-separated tag list.
fn parse_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(value: Option<&str>) -> bool {
    matches!(value.map(str::to_lowercase).as_deref(), Some("true" | "1" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[general]
name=Sample Plugin
qgisMinimumVersion=3.0
description=A sample plugin
author=Jane Dev
email=jane@example.org
tags=vector, raster
experimental=False
deprecated=False
homepage=https://example.org
";

    #[test]
    fn test_parse_general_section() {
        let file = MetadataFile::parse(SAMPLE);
        assert_eq!(file.get("name"), Some("Sample Plugin"));
        assert_eq!(file.get("qgisMinimumVersion"), Some("3.0"));
        assert_eq!(file.get("missing"), None);
    }

    #[test]
    fn test_other_sections_ignored() {
        let content = "[other]\nname=Wrong\n[general]\nname=Right\nqgisMinimumVersion=3.0\n";
        let file = MetadataFile::parse(content);
        assert_eq!(file.get("name"), Some("Right"));
    }

    #[test]
    fn test_set_and_remove() {
        let mut file = MetadataFile::parse(SAMPLE);
        file.set("version", "1.2.3");
        file.set("name", "Renamed");
        file.remove("homepage");

        assert_eq!(file.get("version"), Some("1.2.3"));
        assert_eq!(file.get("name"), Some("Renamed"));
        assert_eq!(file.get("homepage"), None);
    }

    #[test]
    fn test_multiline_value_roundtrip() {
        let mut file = MetadataFile::parse(SAMPLE);
        file.set("changelog", "\nVersion 1.2.3:\n- fixed a thing\n");

        let rendered = file.to_string();
        let reparsed = MetadataFile::parse(&rendered);
        assert_eq!(
            reparsed.get("changelog"),
            Some("Version 1.2.3:\n- fixed a thing"),
        );
        // Order of untouched keys is preserved
        assert!(rendered.find("name=").unwrap() < rendered.find("author=").unwrap());
    }

    #[test]
    fn test_typed_view() {
        let md = PluginMetadata::from_file(&MetadataFile::parse(SAMPLE)).unwrap();
        assert_eq!(md.name, "Sample Plugin");
        assert_eq!(md.tags, vec!["vector", "raster"]);
        assert!(!md.experimental);
        assert_eq!(md.homepage.as_deref(), Some("https://example.org"));
        assert_eq!(md.qgis_maximum_version, None);
    }

    #[test]
    fn test_missing_name_is_an_error() {
        let file = MetadataFile::parse("[general]\nqgisMinimumVersion=3.0\n");
        assert!(PluginMetadata::from_file(&file).is_err());
    }
}
