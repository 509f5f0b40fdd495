use super::{SuccessCallback, Updater};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::hide::{HideFile, PlatformHider};
use crate::platform::Platform;
use crate::replace::{StdFs, SwapFs};
use std::path::PathBuf;

/// Builder for [`Updater`].
///
/// Defaults: detected platform, [`HttpFetcher`], [`PlatformHider`], [`StdFs`], and
/// the path reported by the OS for the running executable.
///
/// ```rust,no_run
/// use selfswap::platform::Platform;
/// use selfswap::updater::Updater;
///
/// let updater = Updater::builder("1.1.0", "https://updates.example.com/", "myapp")
///     .platform(Platform::new("linux", "amd64"))
///     .executable_path("/usr/local/bin/myapp")
///     .build();
/// assert_eq!(updater.current_version(), "1.1.0");
/// ```
pub struct UpdaterBuilder {
    current_version: String,
    base_url: String,
    app_id: String,
    platform: Option<Platform>,
    fetcher: Option<Box<dyn Fetcher>>,
    hider: Option<Box<dyn HideFile>>,
    swap_fs: Option<Box<dyn SwapFs>>,
    executable_path: Option<PathBuf>,
    on_successful_update: Option<SuccessCallback>,
}

impl UpdaterBuilder {
    pub(super) fn new(current_version: String, base_url: String, app_id: String) -> Self {
        Self {
            current_version,
            base_url,
            app_id,
            platform: None,
            fetcher: None,
            hider: None,
            swap_fs: None,
            executable_path: None,
            on_successful_update: None,
        }
    }

    /// Download artifacts for `platform` instead of the detected one.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Fetch manifests and artifacts through `fetcher`.
    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    /// Hide undeletable backups through `hider`.
    pub fn hider(mut self, hider: impl HideFile + 'static) -> Self {
        self.hider = Some(Box::new(hider));
        self
    }

    /// Perform the swap's file operations through `swap_fs`.
    pub fn swap_fs(mut self, swap_fs: impl SwapFs + 'static) -> Self {
        self.swap_fs = Some(Box::new(swap_fs));
        self
    }

    /// Replace the file at `path` instead of the running executable.
    ///
    /// Symlinks in `path` are still resolved on every cycle.
    pub fn executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Call `callback` once after each successful swap.
    ///
    /// Not called when the cycle fails, including when the previous binary was restored.
    pub fn on_successful_update(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_successful_update = Some(Box::new(callback));
        self
    }

    /// Finish building.
    pub fn build(self) -> Updater {
        Updater {
            current_version: self.current_version,
            base_url: self.base_url,
            app_id: self.app_id,
            platform: self.platform.unwrap_or_else(Platform::detect),
            fetched_manifest: None,
            fetcher: self.fetcher.unwrap_or_else(|| Box::new(HttpFetcher::new())),
            hider: self.hider.unwrap_or_else(|| Box::new(PlatformHider)),
            swap_fs: self.swap_fs.unwrap_or_else(|| Box::new(StdFs)),
            executable_override: self.executable_path,
            on_successful_update: self.on_successful_update,
        }
    }
}
