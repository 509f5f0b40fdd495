//! Command-line interface for `selfswap-pack`.
//!
//! The packager turns a built binary (or a directory of per-platform binaries) into
//! the static files an update server hosts:
//!
//! ```bash
//! # Single binary for the current platform
//! selfswap-pack target/release/myapp 1.2.0
//!
//! # Cross-compiled binaries named after their platform
//! selfswap-pack dist/ 1.2.0 -o public
//! #   dist/linux-amd64    -> public/linux-amd64.json, public/1.2.0/linux-amd64.zst
//! #   dist/windows-amd64  -> public/windows-amd64.json, public/1.2.0/windows-amd64.zst
//!
//! # Explicit platform for a single binary
//! selfswap-pack build/myapp 1.2.0 --platform darwin-arm64
//! ```
//!
//! # Logging
//!
//! `RUST_LOG` wins when set. Otherwise `--verbose` logs at debug, `--quiet` logs
//! nothing, and the default is info.

use crate::platform::Platform;
use crate::publish::{PublishedArtifact, Publisher};
use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Package binaries for selfswap update servers.
#[derive(Parser, Debug)]
#[command(
    name = "selfswap-pack",
    about = "Package binaries for selfswap update servers",
    version,
    long_about = "Compresses binaries with zstd and writes the version manifest and \
                  artifact layout that selfswap clients download updates from."
)]
pub struct Cli {
    /// Binary to publish, or a directory of binaries named `{os}-{arch}`
    path: PathBuf,

    /// Version to publish
    #[arg(id = "publish_version", value_name = "VERSION")]
    version: String,

    /// Output directory
    #[arg(short = 'o', long = "out-dir", default_value = "public")]
    out_dir: PathBuf,

    /// Platform of a single binary, as `{os}-{arch}` (default: this machine)
    #[arg(long, env = "SELFSWAP_PLATFORM")]
    platform: Option<String>,

    /// zstd compression level
    #[arg(long, default_value_t = crate::decode::DEFAULT_LEVEL, value_parser = clap::value_parser!(i32).range(1..=22))]
    level: i32,

    /// Log debug output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Log filter implied by the verbosity flags; `None` disables logging.
    #[must_use]
    pub fn log_level(&self) -> Option<&'static str> {
        if self.verbose {
            Some("debug")
        } else if self.quiet {
            None
        } else {
            Some("info")
        }
    }

    /// Install the tracing subscriber and run the packager.
    ///
    /// # Errors
    ///
    /// Fails if the platform override is malformed or publishing fails.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        let quiet = self.quiet;
        let published = tokio::task::spawn_blocking(move || self.run())
            .await
            .context("Packaging task panicked")??;

        if !quiet {
            for artifact in &published {
                print_summary(artifact);
            }
        }
        Ok(())
    }

    /// Publish synchronously, without touching logging.
    ///
    /// # Errors
    ///
    /// See [`Cli::execute`].
    pub fn run(&self) -> Result<Vec<PublishedArtifact>> {
        let platform = match &self.platform {
            Some(id) => Platform::parse(id).context("Invalid --platform")?,
            None => Platform::detect(),
        };

        Publisher::new(&self.out_dir, &self.version)
            .level(self.level)
            .publish(&self.path, &platform)
    }

    fn init_logging(&self) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if let Some(level) = self.log_level() {
            EnvFilter::new(format!("selfswap={level}"))
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

fn print_summary(artifact: &PublishedArtifact) {
    println!(
        "{} {} ({} -> {} bytes)",
        "Published".green().bold(),
        artifact.platform.bold(),
        artifact.original_size,
        artifact.compressed_size
    );
    println!("  {}", artifact.manifest_path.display());
    println!("  {}", artifact.artifact_path.display());
}
