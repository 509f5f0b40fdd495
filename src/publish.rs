//! Producing the files an update server serves.
//!
//! For every binary the packager writes two files under the output directory:
//!
//! ```text
//! {out_dir}/{platform}.json            {"Version": "<version>"}
//! {out_dir}/{version}/{platform}.zst   zstd-compressed binary
//! ```
//!
//! Serving `out_dir` as static files at `{base_url}/{app_id}/` is all an update
//! server needs to do. The artifact is written before the manifest so a client never
//! sees a manifest that points at a missing artifact. Both files are written to a
//! temporary name and renamed into place.

use crate::decode::{DEFAULT_LEVEL, encode_artifact};
use crate::manifest::VersionManifest;
use crate::platform::Platform;
use anyhow::{Context, Result, bail};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Files written for one binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    /// Platform id the binary was published under
    pub platform: String,
    /// Path of the `{platform}.json` manifest
    pub manifest_path: PathBuf,
    /// Path of the `{version}/{platform}.zst` artifact
    pub artifact_path: PathBuf,
    /// Size of the uncompressed binary
    pub original_size: u64,
    /// Size of the compressed artifact
    pub compressed_size: u64,
}

/// Writes manifests and artifacts for one version.
#[derive(Debug, Clone)]
pub struct Publisher {
    out_dir: PathBuf,
    version: String,
    level: i32,
}

impl Publisher {
    /// Publish `version` into `out_dir` at the default compression level.
    pub fn new(out_dir: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            version: version.into(),
            level: DEFAULT_LEVEL,
        }
    }

    /// zstd compression level (1-22).
    pub fn level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Output directory.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Publish a single binary for `platform`.
    ///
    /// # Errors
    ///
    /// Fails if the version is unusable as a path segment, the binary cannot be read,
    /// or the output files cannot be written.
    pub fn publish_file(&self, binary: &Path, platform: &Platform) -> Result<PublishedArtifact> {
        self.check_version()?;
        let platform_id = platform.id();

        let image = fs::read(binary)
            .with_context(|| format!("Failed to read binary {}", binary.display()))?;
        let compressed = encode_artifact(&image, self.level)
            .with_context(|| format!("Failed to compress {}", binary.display()))?;

        let version_dir = self.out_dir.join(&self.version);
        fs::create_dir_all(&version_dir)
            .with_context(|| format!("Failed to create directory {}", version_dir.display()))?;

        let artifact_path = version_dir.join(format!("{platform_id}.zst"));
        write_atomically(&artifact_path, &compressed)?;
        debug!("Wrote {} ({} bytes)", artifact_path.display(), compressed.len());

        let manifest = VersionManifest::new(self.version.clone())
            .to_json_pretty()
            .context("Failed to serialize manifest")?;
        let manifest_path = self.out_dir.join(format!("{platform_id}.json"));
        write_atomically(&manifest_path, manifest.as_bytes())?;

        info!(
            "Published {} {} for {} ({} -> {} bytes)",
            binary.display(),
            self.version,
            platform_id,
            image.len(),
            compressed.len()
        );

        Ok(PublishedArtifact {
            platform: platform_id,
            manifest_path,
            artifact_path,
            original_size: image.len() as u64,
            compressed_size: compressed.len() as u64,
        })
    }

    /// Publish every regular file in `dir`, named after its platform (`linux-amd64`).
    ///
    /// Files are processed in name order. Hidden files are skipped.
    ///
    /// # Errors
    ///
    /// Fails on the first file whose name is not a platform id or that cannot be
    /// published, and if the directory holds no binaries at all.
    pub fn publish_dir(&self, dir: &Path) -> Result<Vec<PublishedArtifact>> {
        let mut binaries = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type()?.is_file() {
                continue;
            }
            binaries.push((name, entry.path()));
        }
        binaries.sort();

        if binaries.is_empty() {
            bail!("No binaries found in {}", dir.display());
        }

        binaries
            .into_iter()
            .map(|(name, path)| {
                let platform = Platform::parse(&name)
                    .with_context(|| format!("{} is not named after a platform", path.display()))?;
                self.publish_file(&path, &platform)
            })
            .collect()
    }

    /// Publish `path`, a binary or a directory of per-platform binaries.
    ///
    /// # Errors
    ///
    /// As [`Publisher::publish_file`] or [`Publisher::publish_dir`].
    pub fn publish(&self, path: &Path, platform: &Platform) -> Result<Vec<PublishedArtifact>> {
        let metadata =
            fs::metadata(path).with_context(|| format!("Cannot access {}", path.display()))?;

        if metadata.is_dir() {
            self.publish_dir(path)
        } else {
            Ok(vec![self.publish_file(path, platform)?])
        }
    }

    fn check_version(&self) -> Result<()> {
        let version = self.version.as_str();
        if version.is_empty()
            || version == "."
            || version == ".."
            || version.contains(['/', '\\'])
        {
            bail!("Invalid version {version:?}: must be usable as a directory name");
        }
        Ok(())
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.persist(path)
        .with_context(|| format!("Failed to move output into place at {}", path.display()))?;
    Ok(())
}
