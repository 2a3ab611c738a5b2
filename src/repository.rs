//! Repository-index XML (`plugins.xml`) generation.
//!
//! A plugin repository is a single XML document listing downloadable plugin
//! releases; pointing a QGIS-style plugin manager at it makes the GitHub
//! release double as a private repository.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use quick_xml::se::Serializer;
use serde::Serialize;

use crate::config::Parameters;
use crate::error::{Error, Result};
use crate::metadata::PluginMetadata;

/// File name of the generated index.
pub const INDEX_FILE: &str = "plugins.xml";

/// Release-specific inputs for the index entry.
#[derive(Debug)]
pub struct IndexSpec<'a> {
    /// Released version string.
    pub release_version: &'a str,
    /// Git tag the release assets are attached to.
    pub tag_ref: &'a str,
    /// File name of the plugin archive.
    pub archive_name: &'a str,
    /// Registry user name shown as the uploader; falls back to the author.
    pub uploaded_by: Option<&'a str>,
    /// Whether the release is experimental (prerelease).
    pub experimental: bool,
    /// Alternate download URL prefix; defaults to the GitHub release asset.
    pub repository_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RepositoryIndex {
    #[serde(rename = "pyqgis_plugin")]
    plugins: Vec<PluginEntry>,
}

/// One `<pyqgis_plugin>` element. Attribute fields (`@`) must come first.
#[derive(Debug, Serialize)]
struct PluginEntry {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@version")]
    version_attr: String,
    description: String,
    about: String,
    version: String,
    qgis_minimum_version: String,
    qgis_maximum_version: String,
    homepage: String,
    file_name: String,
    icon: String,
    author_name: String,
    download_url: String,
    uploaded_by: String,
    create_date: String,
    update_date: String,
    experimental: String,
    deprecated: String,
    tracker: String,
    repository: String,
    tags: String,
}

/// Write `plugins.xml` into `dest_dir` and return its path.
pub fn write_repository_index(
    parameters: &Parameters,
    metadata: &PluginMetadata,
    spec: &IndexSpec<'_>,
    dest_dir: &Path,
) -> Result<PathBuf> {
    let index = RepositoryIndex {
        plugins: vec![build_entry(parameters, metadata, spec, chrono::Local::now().date_naive())],
    };

    let mut body = String::new();
    let mut serializer = Serializer::with_root(&mut body, Some("plugins"))
        .map_err(|e| Error::Index(e.to_string()))?;
    serializer.indent(' ', 2);
    index.serialize(serializer).map_err(|e| Error::Index(e.to_string()))?;

    let path = dest_dir.join(INDEX_FILE);
    std::fs::write(&path, format!("<?xml version=\"1.0\"?>\n{body}\n"))?;
    Ok(path)
}

fn build_entry(
    parameters: &Parameters,
    metadata: &PluginMetadata,
    spec: &IndexSpec<'_>,
    update_date: NaiveDate,
) -> PluginEntry {
    let download_url = match spec.repository_url {
        Some(prefix) => format!("{prefix}{}", spec.archive_name),
        None => format!(
            "https://github.com/{}/{}/releases/download/{}/{}",
            parameters.organization_slug, parameters.project_slug, spec.tag_ref, spec.archive_name
        ),
    };

    PluginEntry {
        name: metadata.name.clone(),
        version_attr: spec.release_version.to_string(),
        description: metadata.description.clone(),
        about: metadata.description.clone(),
        version: spec.release_version.to_string(),
        qgis_minimum_version: metadata.qgis_minimum_version.clone(),
        qgis_maximum_version: metadata
            .qgis_maximum_version
            .clone()
            .unwrap_or_else(|| "3.99".to_string()),
        homepage: metadata.homepage.clone().unwrap_or_default(),
        file_name: spec.archive_name.to_string(),
        icon: metadata.icon.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
        author_name: metadata.author.clone(),
        download_url,
        uploaded_by: spec.uploaded_by.unwrap_or(&metadata.author).to_string(),
        create_date: parameters.create_date.format("%Y-%m-%d").to_string(),
        update_date: update_date.format("%Y-%m-%d").to_string(),
        experimental: python_bool(spec.experimental),
        deprecated: python_bool(metadata.deprecated),
        tracker: metadata.tracker.clone().unwrap_or_default(),
        repository: metadata.repository.clone().unwrap_or_default(),
        tags: metadata.tags.join(","),
    }
}

/// The ecosystem expects capitalized booleans in the index.
fn python_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}
