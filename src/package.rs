//! Plugin archive creation.
//!
//! The archive is built from the plugin source tree *as committed at HEAD*
//! (uncommitted files never ship), staged into a temporary directory where
//! `metadata.txt` is rewritten with the release version, commit information
//! and the changelog excerpt, then zipped under the plugin slug.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use git2::{ObjectType, Repository, TreeWalkMode, TreeWalkResult};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::changelog::ChangeLog;
use crate::config::Parameters;
use crate::error::{Error, Result};
use crate::metadata::{MetadataFile, METADATA_FILE};

/// What to package and where to put it.
#[derive(Debug)]
pub struct ArchiveSpec<'a> {
    /// Version string written into `metadata.txt` and the archive name.
    pub release_version: &'a str,
    /// Directory receiving the zip file.
    pub archive_dest: &'a Path,
    /// Archive file name without the `.zip` extension.
    pub archive_name: &'a str,
    /// Whether the release is marked experimental (prereleases are).
    pub experimental: bool,
    /// Parsed changelog to embed, when one exists.
    pub changelog: Option<&'a ChangeLog>,
}

/// Create the plugin archive and return its path.
pub fn create_archive(parameters: &Parameters, spec: &ArchiveSpec<'_>) -> Result<PathBuf> {
    let repo = Repository::discover(&parameters.rootdir)?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| Error::Package("cannot package from a bare repository".to_string()))?
        .canonicalize()?;

    let plugin_path = parameters.plugin_path().canonicalize()?;
    let plugin_relative = plugin_path
        .strip_prefix(&workdir)
        .map_err(|_| Error::OutsideRepository(plugin_path.clone()))?
        .to_path_buf();

    let metadata = parameters.metadata()?;
    let slug = parameters.plugin_slug(&metadata);

    let staging = tempfile::Builder::new()
        .prefix(".plugship-")
        .tempdir_in(&parameters.rootdir)?;
    let source = staging.path().join(&slug);

    export_head_tree(&repo, &plugin_relative, &source)?;

    // Rewrite the staged metadata, never the working tree
    let metadata_path = source.join(METADATA_FILE);
    if !metadata_path.is_file() {
        return Err(Error::Metadata(format!(
            "no {METADATA_FILE} committed under {}",
            plugin_relative.display()
        )));
    }
    let mut file = MetadataFile::read(&metadata_path)?;

    if !metadata.description.is_empty() {
        file.set("description", &metadata.description);
    }
    if !metadata.author.is_empty() {
        file.set("author", &metadata.author);
    }
    if !metadata.email.is_empty() {
        file.set("email", &metadata.email);
    }
    if !metadata.tags.is_empty() {
        file.set("tags", metadata.tags.join(","));
    }
    if let Some(homepage) = &metadata.homepage {
        file.set("homepage", homepage);
    }
    if let Some(repository) = &metadata.repository {
        file.set("repository", repository);
    }
    if let Some(tracker) = &metadata.tracker {
        file.set("tracker", tracker);
    }

    file.set("version", spec.release_version);
    file.set("commitNumber", commit_count(&repo)?.to_string());
    file.set("commitSha1", head_sha(&repo)?);
    file.set("dateTime", Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string());
    file.set("experimental", if spec.experimental { "True" } else { "False" });

    match spec.changelog {
        Some(changelog) if !changelog.is_empty() => {
            let changes = changelog.format_last_items(parameters.changelog_max_entries);
            tracing::info!("Adding changelog excerpt to {METADATA_FILE}");
            tracing::debug!("Changelog excerpt: {changes}");
            file.set("changelog", changes);
        }
        _ => {
            tracing::info!("No changelog found");
            file.remove("changelog");
        }
    }

    file.write(&metadata_path)?;

    copy_license(&workdir, &source)?;
    copy_i18n_files(&plugin_path, &source)?;

    tracing::info!("Creating archive");
    let archive_path = spec.archive_dest.join(format!("{}.zip", spec.archive_name));
    write_zip(staging.path(), &slug, &archive_path)?;

    Ok(archive_path)
}

/// Export the blobs of the plugin subtree at HEAD into `dest`.
fn export_head_tree(repo: &Repository, plugin_relative: &Path, dest: &Path) -> Result<()> {
    let head_tree = repo.head()?.peel_to_tree()?;
    let subtree = head_tree
        .get_path(plugin_relative)
        .map_err(|_| {
            Error::Package(format!("{} is not committed at HEAD", plugin_relative.display()))
        })?
        .to_object(repo)?
        .peel_to_tree()?;

    fs::create_dir_all(dest)?;

    let mut failure: Option<Error> = None;
    let walked = subtree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() != Some(ObjectType::Blob) {
            return TreeWalkResult::Ok;
        }
        let Some(name) = entry.name() else {
            return TreeWalkResult::Ok;
        };

        let result = (|| -> Result<()> {
            let blob = repo.find_blob(entry.id())?;
            let target = dest.join(root).join(name);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, blob.content())?;
            Ok(())
        })();

        match result {
            Ok(()) => TreeWalkResult::Ok,
            Err(err) => {
                failure = Some(err);
                TreeWalkResult::Abort
            }
        }
    });

    // An aborted walk surfaces as a git error; the IO failure that caused
    // the abort is the one worth reporting.
    if let Some(err) = failure {
        return Err(err);
    }
    walked?;
    Ok(())
}

/// Number of commits reachable from HEAD.
fn commit_count(repo: &Repository) -> Result<usize> {
    let mut revwalk = repo.revwalk()?;
    revwalk.push_head()?;
    Ok(revwalk.count())
}

fn head_sha(repo: &Repository) -> Result<String> {
    Ok(repo.head()?.peel_to_commit()?.id().to_string())
}

/// Ship the repository license with the plugin when it has none of its own.
/// Both spellings count as existing; the copy is always written as LICENSE.
fn copy_license(workdir: &Path, source: &Path) -> Result<()> {
    if source.join("LICENSE").exists() || source.join("LICENCE").exists() {
        return Ok(());
    }
    let license = workdir.join("LICENSE");
    if license.is_file() {
        tracing::debug!("Copying repository LICENSE into the plugin");
        fs::copy(license, source.join("LICENSE"))?;
    }
    Ok(())
}

/// Copy compiled translation files present in the working tree but not in
/// the committed export (`.qm` files are usually build products).
fn copy_i18n_files(plugin_path: &Path, source: &Path) -> Result<()> {
    let src = plugin_path.join("i18n");
    let dst = source.join("i18n");
    if !src.is_dir() || dst.exists() {
        return Ok(());
    }

    tracing::info!("Copying i18n files");
    fs::create_dir(&dst)?;
    for entry in fs::read_dir(&src)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "qm") {
            tracing::debug!("Copying {}", path.display());
            fs::copy(&path, dst.join(entry.file_name()))?;
        }
    }
    Ok(())
}

/// Zip the staged tree, with entries rooted at the slug directory.
fn write_zip(staging: &Path, slug: &str, archive_path: &Path) -> Result<()> {
    let file = fs::File::create(archive_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let root = staging.join(slug);
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(staging)
            .map_err(|e| Error::Package(e.to_string()))?;
        let name = zip_entry_name(relative);

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{name}/"), options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options)?;
            let mut reader = fs::File::open(entry.path())?;
            io::copy(&mut reader, &mut writer)?;
        }
    }

    writer.finish()?;
    Ok(())
}

/// Zip entry names always use forward slashes.
fn zip_entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_entry_name_uses_forward_slashes() {
        let path = Path::new("slug").join("i18n").join("plugin_fr.qm");
        assert_eq!(zip_entry_name(&path), "slug/i18n/plugin_fr.qm");
    }
}
