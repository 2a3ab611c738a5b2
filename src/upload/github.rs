//! GitHub release asset uploads.
//!
//! Release assets are attached to an existing release for the git tag; the
//! release itself is expected to be created by the CI workflow (or by hand)
//! before plugship runs.

use std::path::Path;

use serde::Deserialize;

use super::UploadError;

/// GitHub REST API base URL.
const GITHUB_API: &str = "https://api.github.com";

/// A GitHub release, as returned by the releases API.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Release id
    pub id: u64,
    /// Tag the release points at
    pub tag_name: String,
    /// Hypermedia upload URL template (`.../assets{?name,label}`)
    pub upload_url: String,
    /// URL listing the release assets
    pub assets_url: String,
}

/// An uploaded release asset.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    /// Asset id
    pub id: u64,
    /// Asset file name
    pub name: String,
    /// API URL of the asset
    pub url: String,
    /// Download URL of the asset
    pub browser_download_url: String,
}

/// Error payload of the GitHub API.
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// GitHub releases API client.
#[derive(Debug, Clone)]
pub struct GithubClient {
    /// GitHub API token
    token: String,
    /// Repository owner
    owner: String,
    /// Repository name
    repo: String,
    /// HTTP client
    client: reqwest::blocking::Client,
}

impl GithubClient {
    /// Create a new client for `owner/repo`.
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Repository slug (`owner/repo`).
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::blocking::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", format!("{}/{}", crate::APP_NAME, crate::VERSION))
    }

    /// Resolve the release attached to a git tag.
    pub fn release_by_tag(&self, tag: &str) -> Result<Release, UploadError> {
        let url = format!("{GITHUB_API}/repos/{}/releases/tags/{tag}", self.slug());
        tracing::debug!("Getting release on {} for ref '{tag}'", self.slug());

        let response = self.request(reqwest::Method::GET, &url).send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(UploadError::ReleaseNotFound(tag.to_string()));
        }
        let response = check_status(response)?;

        let release: Release = response.json()?;
        tracing::debug!("Release retrieved: {} -> {}", release.tag_name, release.upload_url);
        Ok(release)
    }

    /// Upload a file as a release asset, optionally under a different name.
    pub fn upload_asset(
        &self,
        release: &Release,
        asset_path: &Path,
        asset_name: Option<&str>,
    ) -> Result<Asset, UploadError> {
        let name = match asset_name {
            Some(name) => name.to_string(),
            None => asset_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| UploadError::Protocol("asset path has no file name".to_string()))?,
        };

        let mut url = format!("{}?name={name}", expand_upload_url(&release.upload_url));
        if asset_name.is_some() {
            url.push_str(&format!("&label={name}"));
        }

        tracing::info!("Uploading asset {}", asset_path.display());
        let bytes = std::fs::read(asset_path)?;
        let response = self
            .request(reqwest::Method::POST, &url)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()?;
        let response = check_status(response)?;

        let asset: Asset = response.json()?;
        tracing::info!("Asset uploaded to {}", asset.browser_download_url);
        Ok(asset)
    }
}

/// Surface the API error message of a non-success response.
fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ApiError>()
        .map(|e| e.message)
        .unwrap_or_else(|_| status.to_string());
    Err(UploadError::Api { status: status.as_u16(), message })
}

/// Strip the `{?name,label}` hypermedia suffix from an upload URL template.
fn expand_upload_url(template: &str) -> &str {
    match template.find('{') {
        Some(index) => &template[..index],
        None => template,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_upload_url() {
        assert_eq!(
            expand_upload_url(
                "https://uploads.github.com/repos/acme/sample/releases/1/assets{?name,label}"
            ),
            "https://uploads.github.com/repos/acme/sample/releases/1/assets"
        );
        assert_eq!(expand_upload_url("https://example.org/assets"), "https://example.org/assets");
    }

    #[test]
    fn test_slug() {
        let client = GithubClient::new("token", "acme", "sample-plugin");
        assert_eq!(client.slug(), "acme/sample-plugin");
    }
}
