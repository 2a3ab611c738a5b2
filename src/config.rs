//! Configuration management for Plugship.
//!
//! Project parameters are loaded from a `plugship.toml` (or `.plugship.toml`)
//! at the project root; everything but the plugin source directory and the
//! repository slugs has a sensible default.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::metadata::PluginMetadata;

/// Default endpoint for publishing to the plugin registry.
pub const DEFAULT_UPLOAD_URL: &str = "https://plugins.qgis.org:443/plugins/RPC2/";

/// Candidate configuration file names, in discovery order.
const CONFIG_FILES: &[&str] = &["plugship.toml", ".plugship.toml"];

/// Project parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parameters {
    /// Project root directory (where the config file lives). Not part of
    /// the file itself.
    #[serde(skip)]
    pub rootdir: PathBuf,

    /// The directory of the plugin source code in the repository.
    pub plugin_source: PathBuf,

    /// Organization slug on the SCM host (e.g. GitHub).
    pub organization_slug: String,

    /// Project slug on the SCM host.
    pub project_slug: String,

    /// Changelog file, relative to the project root.
    #[serde(default = "default_changelog_file")]
    pub changelog_file: String,

    /// Number of changelog entries to embed in `metadata.txt`.
    #[serde(default = "default_changelog_max_entries")]
    pub changelog_max_entries: usize,

    /// Date of creation of the plugin, used in the repository-index XML.
    #[serde(default = "default_create_date")]
    pub create_date: NaiveDate,

    /// Server endpoint for uploading the plugin to the registry.
    #[serde(default = "default_upload_url")]
    pub upload_url: String,

    /// Optional overrides filling gaps in the plugin's own `metadata.txt`.
    #[serde(default)]
    pub metadata: MetadataOverrides,
}

/// Project-level metadata used when the plugin's `metadata.txt` leaves a
/// field empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataOverrides {
    pub author: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub tracker: Option<String>,
    pub repository: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_changelog_file() -> String {
    "CHANGELOG.md".to_string()
}

fn default_changelog_max_entries() -> usize {
    3
}

fn default_create_date() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn default_upload_url() -> String {
    DEFAULT_UPLOAD_URL.to_string()
}

impl Parameters {
    /// Load parameters from the configuration file found in `rootdir`.
    pub fn load(rootdir: &Path) -> Result<Self> {
        let path = find_config_file(rootdir).ok_or_else(|| {
            Error::Config(format!("no plugship.toml found in {}", rootdir.display()))
        })?;

        tracing::debug!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content, rootdir)
    }

    /// Parse parameters from TOML text.
    pub fn from_toml(content: &str, rootdir: &Path) -> Result<Self> {
        let mut params: Self =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        params.rootdir = rootdir.to_path_buf();
        Ok(params)
    }

    /// Absolute path of the plugin source directory.
    pub fn plugin_path(&self) -> PathBuf {
        self.rootdir.join(&self.plugin_source)
    }

    /// Absolute path of the changelog file.
    pub fn changelog_path(&self) -> PathBuf {
        self.rootdir.join(&self.changelog_file)
    }

    /// Read the plugin metadata and fill empty fields from the `[metadata]`
    /// overrides.
    pub fn metadata(&self) -> Result<PluginMetadata> {
        let mut md = PluginMetadata::read(&self.plugin_path())?;

        let overrides = &self.metadata;
        if md.author.is_empty() {
            if let Some(author) = &overrides.author {
                md.author = author.clone();
            }
        }
        if md.email.is_empty() {
            if let Some(email) = &overrides.email {
                md.email = email.clone();
            }
        }
        if md.description.is_empty() {
            if let Some(description) = &overrides.description {
                md.description = description.clone();
            }
        }
        if md.homepage.is_none() {
            md.homepage = overrides.homepage.clone();
        }
        if md.tracker.is_none() {
            md.tracker = overrides.tracker.clone();
        }
        if md.repository.is_none() {
            md.repository = overrides.repository.clone();
        }
        if md.tags.is_empty() {
            md.tags = overrides.tags.clone();
        }

        Ok(md)
    }

    /// Plugin slug: the metadata name lowercased with non-alphanumeric runs
    /// collapsed to `_`. Used for the staged directory and the archive name.
    pub fn plugin_slug(&self, metadata: &PluginMetadata) -> String {
        slugify(&metadata.name)
    }
}

/// Find a candidate config file in the given directory.
pub fn find_config_file(rootdir: &Path) -> Option<PathBuf> {
    CONFIG_FILES.iter().map(|name| rootdir.join(name)).find(|p| p.is_file())
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_sep = true;

    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }

    slug.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
plugin_source = "sample_plugin"
organization_slug = "acme"
project_slug = "sample-plugin"
"#;

    #[test]
    fn test_defaults() {
        let params = Parameters::from_toml(SAMPLE, Path::new("/project")).unwrap();
        assert_eq!(params.changelog_file, "CHANGELOG.md");
        assert_eq!(params.changelog_max_entries, 3);
        assert_eq!(params.upload_url, DEFAULT_UPLOAD_URL);
        assert_eq!(params.plugin_path(), Path::new("/project/sample_plugin"));
        assert_eq!(params.changelog_path(), Path::new("/project/CHANGELOG.md"));
    }

    #[test]
    fn test_explicit_values() {
        let content = r#"
plugin_source = "src/plugin"
organization_slug = "acme"
project_slug = "sample"
changelog_file = "CHANGES.md"
changelog_max_entries = 5
create_date = "2020-05-01"
upload_url = "https://registry.example.org/RPC2/"

[metadata]
author = "Acme Team"
tags = ["vector"]
"#;
        let params = Parameters::from_toml(content, Path::new("/p")).unwrap();
        assert_eq!(params.changelog_file, "CHANGES.md");
        assert_eq!(params.changelog_max_entries, 5);
        assert_eq!(params.create_date, NaiveDate::from_ymd_opt(2020, 5, 1).unwrap());
        assert_eq!(params.metadata.author.as_deref(), Some("Acme Team"));
    }

    #[test]
    fn test_missing_plugin_source_is_an_error() {
        let content = "organization_slug = \"acme\"\nproject_slug = \"sample\"\n";
        assert!(Parameters::from_toml(content, Path::new("/p")).is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let content = format!("{SAMPLE}\nunknown_key = true\n");
        assert!(Parameters::from_toml(&content, Path::new("/p")).is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Sample Plugin"), "sample_plugin");
        assert_eq!(slugify("Géo-Tools 2"), "géo_tools_2");
        assert_eq!(slugify("already_slugged"), "already_slugged");
    }
}
