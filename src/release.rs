//! Release pipeline orchestration.
//!
//! One linear pass: parse the changelog, resolve the version, build the
//! archive, optionally generate the repository index, then upload whatever
//! the credentials allow.

use std::path::PathBuf;

use semver::Version;

use crate::changelog::ChangeLog;
use crate::config::Parameters;
use crate::error::{Error, Result};
use crate::package::{create_archive, ArchiveSpec};
use crate::repository::{write_repository_index, IndexSpec, INDEX_FILE};
use crate::upload::GithubClient;

/// Everything the pipeline may need beyond the parameters file.
#[derive(Debug, Default)]
pub struct ReleaseOptions {
    /// Version to release; `None` means "latest from the changelog".
    pub release_version: Option<Version>,
    /// GitHub API token; uploads are skipped without one.
    pub github_token: Option<String>,
    /// Git tag carrying the release; defaults to the version string.
    pub tag_ref: Option<String>,
    /// Registry user name shown as uploader in the repository index.
    pub osgeo_username: Option<String>,
    /// Generate a `plugins.xml` repository index.
    pub create_plugin_repository: bool,
    /// Alternate download URL prefix for the repository index.
    pub repository_url: Option<String>,
    /// Log instead of uploading.
    pub dry_run: bool,
}

/// Run the pipeline; returns the path of the created archive.
pub fn release(parameters: &Parameters, options: &ReleaseOptions) -> Result<PathBuf> {
    let changelog_path = parameters.changelog_path();
    let changelog = if changelog_path.is_file() {
        Some(ChangeLog::parse(&changelog_path)?)
    } else {
        tracing::warn!("No changelog found at {}", changelog_path.display());
        None
    };

    let release_version = resolve_version(options.release_version.clone(), changelog.as_ref())?;
    let version_string = release_version.to_string();
    let experimental = !release_version.pre.is_empty();

    let metadata = parameters.metadata()?;
    let slug = parameters.plugin_slug(&metadata);
    let archive_name = format!("{slug}.{version_string}");

    let archive_path = create_archive(
        parameters,
        &ArchiveSpec {
            release_version: &version_string,
            archive_dest: &parameters.rootdir,
            archive_name: &archive_name,
            experimental,
            changelog: changelog.as_ref(),
        },
    )?;

    // The release version doubles as the git ref unless told otherwise
    let tag_ref = options.tag_ref.clone().unwrap_or_else(|| version_string.clone());

    let archive_file_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{archive_name}.zip"));

    if options.create_plugin_repository {
        let index_path = write_repository_index(
            parameters,
            &metadata,
            &IndexSpec {
                release_version: &version_string,
                tag_ref: &tag_ref,
                archive_name: &archive_file_name,
                uploaded_by: options.osgeo_username.as_deref(),
                experimental,
                repository_url: options.repository_url.as_deref(),
            },
            &parameters.rootdir,
        )?;
        tracing::info!("Local XML repository file created: {}", index_path.display());

        if let Some(token) = &options.github_token {
            if options.dry_run {
                tracing::info!(
                    "Not uploading {} because it is a dry run",
                    index_path.display()
                );
            } else {
                let client = github_client(parameters, token);
                let gh_release = client.release_by_tag(&tag_ref)?;
                client.upload_asset(&gh_release, &index_path, Some(INDEX_FILE))?;
            }
        }
    }

    if let Some(token) = &options.github_token {
        if options.dry_run {
            tracing::info!(
                "Not uploading {} to GitHub because it is a dry run",
                archive_path.display()
            );
        } else {
            let client = github_client(parameters, token);
            let gh_release = client.release_by_tag(&tag_ref)?;
            client.upload_asset(&gh_release, &archive_path, None)?;
        }
    }

    Ok(archive_path)
}

fn github_client(parameters: &Parameters, token: &str) -> GithubClient {
    GithubClient::new(token, &parameters.organization_slug, &parameters.project_slug)
}

/// Use the explicit version, or fall back to the changelog's latest entry.
fn resolve_version(explicit: Option<Version>, changelog: Option<&ChangeLog>) -> Result<Version> {
    if let Some(version) = explicit {
        return Ok(version);
    }

    let latest = changelog
        .and_then(ChangeLog::latest)
        .ok_or(Error::NoReleaseVersion)?;
    let tag = latest.version();
    Version::parse(&tag).map_err(|_| Error::InvalidVersion(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_explicit_version() {
        let version = Version::parse("1.2.3").unwrap();
        let resolved = resolve_version(Some(version.clone()), None).unwrap();
        assert_eq!(resolved, version);
    }

    #[test]
    fn test_resolve_latest_from_changelog() {
        let changelog =
            ChangeLog::parse_text("## [10.1.0-beta1] - 2021/02/08\n- latest\n\n## 10.0.1 - 2021/01/01\n- older\n");
        let resolved = resolve_version(None, Some(&changelog)).unwrap();
        assert_eq!(resolved, Version::parse("10.1.0-beta1").unwrap());
        assert!(!resolved.pre.is_empty());
    }

    #[test]
    fn test_resolve_without_version_or_changelog() {
        assert!(matches!(resolve_version(None, None), Err(Error::NoReleaseVersion)));

        let empty = ChangeLog::parse_text("");
        assert!(matches!(resolve_version(None, Some(&empty)), Err(Error::NoReleaseVersion)));
    }

    #[test]
    fn test_resolve_rejects_non_semver_latest() {
        let changelog = ChangeLog::parse_text("## v0.1.1 - 2020/01/02\n- v-prefixed tag\n");
        assert!(matches!(resolve_version(None, Some(&changelog)), Err(Error::InvalidVersion(_))));
    }
}
