//! Artifact publishing: GitHub release assets and the plugin registry.

pub mod github;
pub mod registry;

use thiserror::Error;

pub use github::GithubClient;
pub use registry::RegistryClient;

/// Errors that can occur while uploading artifacts.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Network or protocol failure.
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// No release exists for the requested tag.
    #[error("No GitHub release found for tag '{0}'")]
    ReleaseNotFound(String),

    /// The GitHub API rejected the request.
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The registry answered with an XML-RPC fault.
    #[error("Registry fault {code}: {message}")]
    Fault { code: i64, message: String },

    /// The registry answer could not be understood.
    #[error("Invalid registry response: {0}")]
    Protocol(String),

    /// Reading the artifact from disk failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
