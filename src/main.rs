//! Plugship - release packaging CLI for QGIS-style plugin ecosystems.
//!
//! Single-invocation pipeline meant to run from CI: parse the changelog,
//! build the plugin archive, optionally generate the repository index and
//! upload everything.

use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use semver::Version;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use plugship::upload::RegistryClient;
use plugship::{release, ChangeLog, Error, Parameters, ReleaseOptions, APP_NAME};

/// Release packaging CLI for plugin ecosystems
#[derive(Parser)]
#[command(name = "plugship")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the changelog content for a version (or "latest")
    Changelog {
        /// Version to look up, or "latest"
        release_version: String,
    },

    /// Create the plugin archive
    Package {
        /// Version to package, or "latest" to take it from the changelog
        release_version: String,

        /// Plugin repository URL; also generates a local plugins.xml
        #[arg(long = "plugin-repo-url")]
        plugin_repo_url: Option<String>,
    },

    /// Create the plugin archive and publish it
    Release {
        /// Version to release, or "latest" to take it from the changelog
        release_version: String,

        /// GitHub API token for uploading release assets
        #[arg(long, env = "GITHUB_TOKEN")]
        github_token: Option<String>,

        /// Create a plugins.xml repository index as a release asset
        #[arg(long)]
        create_plugin_repo: bool,

        /// Alternate plugin repository URL for the index download links
        #[arg(long = "plugin-repo-url")]
        plugin_repo_url: Option<String>,

        /// Git tag of the release; defaults to the release version
        #[arg(long)]
        git_tag: Option<String>,

        /// Registry user name for publishing the plugin
        #[arg(long)]
        osgeo_username: Option<String>,

        /// Registry password for publishing the plugin
        #[arg(long, env = "OSGEO_PASSWORD")]
        osgeo_password: Option<String>,

        /// Do not upload anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();
}

fn run(command: Commands) -> Result<()> {
    let rootdir = std::env::current_dir()?;

    match command {
        Commands::Changelog { release_version } => {
            let parameters = Parameters::load(&rootdir)?;
            print_changelog(&parameters, &release_version)
        }

        Commands::Package { release_version, plugin_repo_url } => {
            let parameters = Parameters::load(&rootdir)?;
            let options = ReleaseOptions {
                release_version: validate_version(&release_version)?,
                create_plugin_repository: plugin_repo_url.is_some(),
                repository_url: plugin_repo_url,
                ..ReleaseOptions::default()
            };
            let archive = release(&parameters, &options)?;
            print_archive_created(&archive)
        }

        Commands::Release {
            release_version,
            github_token,
            create_plugin_repo,
            plugin_repo_url,
            git_tag,
            osgeo_username,
            osgeo_password,
            dry_run,
        } => {
            let parameters = Parameters::load(&rootdir)?;
            let options = ReleaseOptions {
                release_version: validate_version(&release_version)?,
                github_token,
                tag_ref: git_tag,
                osgeo_username: osgeo_username.clone(),
                create_plugin_repository: create_plugin_repo || plugin_repo_url.is_some(),
                repository_url: plugin_repo_url,
                dry_run,
            };
            let archive = release(&parameters, &options)?;
            print_archive_created(&archive)?;

            if let (Some(username), Some(password)) = (osgeo_username, osgeo_password) {
                if dry_run {
                    tracing::info!(
                        "Not uploading {} to the registry because it is a dry run",
                        archive.display()
                    );
                } else {
                    let client = RegistryClient::new(&parameters.upload_url, username, password);
                    client.upload_plugin(&archive)?;
                }
            }

            Ok(())
        }

        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), APP_NAME, &mut io::stdout());
            Ok(())
        }
    }
}

/// Print the changelog text for the requested tag; missing file and
/// unresolvable tags exit non-zero.
fn print_changelog(parameters: &Parameters, tag: &str) -> Result<()> {
    let path = parameters.changelog_path();
    if !path.is_file() {
        return Err(Error::NoChangelog.into());
    }

    let changelog = ChangeLog::parse(&path)?;
    let note = changelog
        .find(tag)
        .ok_or_else(|| Error::VersionNotFound(tag.to_string()))?;
    if let Some(text) = note.text() {
        println!("{text}");
    }
    Ok(())
}

fn print_archive_created(archive: &Path) -> Result<()> {
    let size = archive.metadata()?.len();
    println!(
        "Plugin archive created: {} ({})",
        archive.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        hsize(size)
    );
    Ok(())
}

/// `"latest"` defers version resolution to the changelog; anything else
/// must be strict semver.
fn validate_version(release_version: &str) -> Result<Option<Version>> {
    if release_version == "latest" {
        return Ok(None);
    }

    Version::parse(release_version)
        .map(Some)
        .map_err(|_| Error::InvalidVersion(release_version.to_string()).into())
}

/// Human-readable size, 1024-based.
fn hsize(octets: u64) -> String {
    const UNITS: [&str; 6] = ["octets", "Ko", "Mo", "Go", "To", "Po"];

    if octets == 0 {
        return "0 octet".to_string();
    }

    let exponent = ((octets as f64).log(1024.0).floor() as usize).min(UNITS.len() - 1);
    let value = octets as f64 / 1024f64.powi(exponent as i32);

    format!("{value:.2} {}", UNITS[exponent])
}
