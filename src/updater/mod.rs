//! Update orchestration.
//!
//! [`Updater`] is the session object an application keeps for its lifetime. It ties the
//! pieces of an update cycle together:
//!
//! ```text
//! wants_update ─► resolve_manifest ─► available_version ─► fetch_binary ─► Replacer
//!   (dev? stop)    (GET .json)          (equal? stop)        (GET .zst)       (swap)
//! ```
//!
//! Every capability the cycle touches (network, filesystem, hide attribute) is a field
//! injected through [`UpdaterBuilder`]; nothing is process-global.
//!
//! # Examples
//!
//! ```rust,no_run
//! use selfswap::updater::{UpdateStatus, Updater};
//!
//! # fn example() -> selfswap::core::Result<()> {
//! let mut updater = Updater::builder(env!("CARGO_PKG_VERSION"), "https://updates.example.com/", "myapp")
//!     .on_successful_update(|| println!("restart to finish updating"))
//!     .build();
//!
//! match updater.run_in_background()? {
//!     UpdateStatus::Updated { to, .. } => println!("installed {to}"),
//!     UpdateStatus::UpToDate { .. } | UpdateStatus::Disabled => {}
//! }
//! # Ok(())
//! # }
//! ```

mod builder;


pub use builder::UpdaterBuilder;

use crate::artifact::fetch_binary;
use crate::config::UpdaterConfig;
use crate::core::{Result, SelfswapError};
use crate::decision::{available_version, wants_update};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::hide::HideFile;
use crate::manifest::{VersionManifest, resolve_manifest};
use crate::platform::Platform;
use crate::replace::{BackupDisposition, ReplacementPaths, Replacer, SwapFs, probe_writable};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of an update cycle that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The running build is the development sentinel; nothing was checked.
    Disabled,
    /// The server advertises the running version.
    UpToDate {
        /// The version both sides agree on
        version: String,
    },
    /// A new binary now occupies the executable path.
    Updated {
        /// Version that was running when the cycle started
        from: String,
        /// Version that was installed
        to: String,
        /// What became of the previous binary
        backup: BackupDisposition,
    },
}

impl UpdateStatus {
    /// Whether the executable on disk changed.
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

type SuccessCallback = Box<dyn FnMut() + Send>;

/// Self-update session for one application.
pub struct Updater {
    current_version: String,
    base_url: String,
    app_id: String,
    platform: Platform,
    fetched_manifest: Option<VersionManifest>,
    fetcher: Box<dyn Fetcher>,
    hider: Box<dyn HideFile>,
    swap_fs: Box<dyn SwapFs>,
    executable_override: Option<PathBuf>,
    on_successful_update: Option<SuccessCallback>,
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("current_version", &self.current_version)
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("platform", &self.platform)
            .field("fetched_manifest", &self.fetched_manifest)
            .field("executable_override", &self.executable_override)
            .field("on_successful_update", &self.on_successful_update.is_some())
            .finish_non_exhaustive()
    }
}

impl Updater {
    /// Start building a session for `app_id` at `current_version`, served from `base_url`.
    pub fn builder(
        current_version: impl Into<String>,
        base_url: impl Into<String>,
        app_id: impl Into<String>,
    ) -> UpdaterBuilder {
        UpdaterBuilder::new(current_version.into(), base_url.into(), app_id.into())
    }

    /// Build a session from configuration, fetching over HTTP.
    ///
    /// # Errors
    ///
    /// [`SelfswapError::Config`] if the configuration does not validate.
    pub fn from_config(current_version: impl Into<String>, config: &UpdaterConfig) -> Result<Self> {
        config.validate()?;

        let fetcher = HttpFetcher::new()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .accept_invalid_certs(config.accept_invalid_certs);

        Ok(Self::builder(current_version, config.base_url.clone(), config.app_id.clone())
            .platform(config.platform()?)
            .fetcher(fetcher)
            .build())
    }

    /// Version of the running binary.
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Platform whose artifacts this session downloads.
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// The manifest from the most recent resolution, if any.
    pub fn fetched_manifest(&self) -> Option<&VersionManifest> {
        self.fetched_manifest.as_ref()
    }

    /// `false` for development builds, `true` otherwise.
    pub fn wants_update(&self) -> bool {
        wants_update(&self.current_version)
    }

    /// Resolve the manifest and remember it.
    ///
    /// # Errors
    ///
    /// Fetch or decode failures from [`resolve_manifest`].
    pub fn fetch_manifest(&mut self) -> Result<&VersionManifest> {
        let manifest =
            resolve_manifest(self.fetcher.as_ref(), &self.base_url, &self.app_id, &self.platform)?;
        Ok(self.fetched_manifest.insert(manifest))
    }

    /// The advertised version if it differs from the running one.
    ///
    /// Versions are compared as exact strings, so an older advertised version is
    /// reported too. The development sentinel is not consulted here.
    ///
    /// # Errors
    ///
    /// Fetch or decode failures while resolving the manifest.
    pub fn check_available(&mut self) -> Result<Option<String>> {
        let current = self.current_version.clone();
        let manifest = self.fetch_manifest()?;
        Ok(available_version(&current, &manifest.version).map(str::to_string))
    }

    /// Run a full update cycle, skipping it when the advertised version is current.
    ///
    /// # Errors
    ///
    /// Any error from resolution, download or replacement. A
    /// [`SelfswapError::FatalSwap`] means the executable may be missing.
    pub fn apply_update(&mut self) -> Result<UpdateStatus> {
        self.update(false)
    }

    /// Run a full update cycle even when the advertised version is current.
    ///
    /// Re-installs the advertised build, e.g. to repair a damaged binary. Development
    /// builds are still left alone.
    ///
    /// # Errors
    ///
    /// Same as [`Updater::apply_update`].
    pub fn apply_update_forced(&mut self) -> Result<UpdateStatus> {
        self.update(true)
    }

    /// Check, probe and update; the entry point for periodic background checks.
    ///
    /// The writability probe runs before any network access so a permission problem is
    /// reported without downloading anything.
    ///
    /// # Errors
    ///
    /// [`SelfswapError::NotWritable`] from the probe, otherwise as
    /// [`Updater::apply_update`].
    pub fn run_in_background(&mut self) -> Result<UpdateStatus> {
        if !self.wants_update() {
            debug!("Running a development build, skipping update check");
            return Ok(UpdateStatus::Disabled);
        }

        self.can_update()?;
        self.apply_update()
    }

    /// Pre-flight check that the executable's directory accepts new files.
    ///
    /// # Errors
    ///
    /// [`SelfswapError::Executable`] if the executable cannot be located,
    /// [`SelfswapError::NotWritable`] if its directory is read-only to this process.
    pub fn can_update(&self) -> Result<()> {
        let executable = self.executable_path()?;
        probe_writable(&ReplacementPaths::new(&executable)?)
    }

    /// Symlink-free path of the running executable.
    ///
    /// Resolved on every call since the link may have been retargeted since startup.
    /// If canonicalization fails the unresolved path is used.
    ///
    /// # Errors
    ///
    /// [`SelfswapError::Executable`] if the OS cannot report the executable path.
    pub fn executable_path(&self) -> Result<PathBuf> {
        let path = match &self.executable_override {
            Some(path) => path.clone(),
            None => std::env::current_exe().map_err(|e| SelfswapError::Executable {
                reason: e.to_string(),
            })?,
        };

        match std::fs::canonicalize(&path) {
            Ok(resolved) => Ok(resolved),
            Err(e) => {
                warn!("Could not resolve {}: {}; using it as is", path.display(), e);
                Ok(path)
            }
        }
    }

    fn update(&mut self, force: bool) -> Result<UpdateStatus> {
        if !self.wants_update() {
            debug!("Running a development build, skipping update");
            return Ok(UpdateStatus::Disabled);
        }

        let executable = self.executable_path()?;
        let advertised = self.fetch_manifest()?.version.clone();

        if !force && available_version(&self.current_version, &advertised).is_none() {
            debug!("Already running advertised version {}", advertised);
            return Ok(UpdateStatus::UpToDate {
                version: advertised,
            });
        }

        info!(
            "Updating {} from {} to {}{}",
            self.app_id,
            self.current_version,
            advertised,
            if force { " (forced)" } else { "" }
        );

        let image = fetch_binary(
            self.fetcher.as_ref(),
            &self.base_url,
            &self.app_id,
            &advertised,
            &self.platform,
        )?;

        let backup =
            Replacer::new(self.swap_fs.as_ref(), self.hider.as_ref()).replace(&executable, &image)?;

        if let Some(callback) = self.on_successful_update.as_mut() {
            callback();
        }

        Ok(UpdateStatus::Updated {
            from: self.current_version.clone(),
            to: advertised,
            backup,
        })
    }
}
