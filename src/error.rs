//! Crate-level error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::upload::UploadError;

/// Result type for plugship operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while packaging or publishing a plugin.
#[derive(Debug, Error)]
pub enum Error {
    /// No changelog file is present in the project.
    #[error("No changelog")]
    NoChangelog,

    /// The requested version string is not valid semver.
    #[error("'{0}' is not following SemVer specification")]
    InvalidVersion(String),

    /// The requested version could not be resolved from the changelog.
    #[error("Version '{0}' not found in changelog")]
    VersionNotFound(String),

    /// No release version was given and none could be derived.
    #[error("No release version given and none found in the changelog")]
    NoReleaseVersion,

    /// Configuration file missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plugin metadata file missing or invalid.
    #[error("Invalid plugin metadata: {0}")]
    Metadata(String),

    /// Archive creation failed before or outside the zip writer.
    #[error("Packaging error: {0}")]
    Package(String),

    /// The plugin source is not part of the enclosing git repository.
    #[error("Plugin source {0} is not inside the git repository")]
    OutsideRepository(PathBuf),

    /// Git error.
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive creation failed.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Repository index serialization failed.
    #[error("Repository index error: {0}")]
    Index(String),

    /// Upload to GitHub or the plugin registry failed.
    #[error(transparent)]
    Upload(#[from] UploadError),
}
