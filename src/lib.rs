//! # Plugship
//!
//! Release packaging CLI for QGIS-style plugin ecosystems.
//!
//! Plugship reads a plugin's `metadata.txt` and `CHANGELOG.md`, builds a
//! versioned zip archive from the committed source tree, optionally generates
//! a repository-index `plugins.xml`, and uploads the artifacts to a GitHub
//! release and to the plugin registry (XML-RPC).
//!
//! ## Quick Start
//!
//! ```bash
//! # Install
//! cargo install plugship
//!
//! # Print the changelog entry for the latest release
//! plugship changelog latest
//!
//! # Build the plugin archive for a tag
//! plugship package 1.3.1
//!
//! # Full release pipeline (archive + plugins.xml + uploads)
//! plugship release 1.3.1 --github-token $GITHUB_TOKEN --create-plugin-repo
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]

pub mod changelog;
pub mod config;
pub mod error;
pub mod metadata;
pub mod package;
pub mod release;
pub mod repository;
pub mod upload;

// Re-export commonly used types
pub use changelog::{ChangeLog, VersionNote};
pub use config::Parameters;
pub use error::{Error, Result};
pub use metadata::{MetadataFile, PluginMetadata};
pub use release::{release, ReleaseOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "plugship";
