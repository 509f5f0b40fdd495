//! Updater configuration.
//!
//! An embedding application usually compiles its update server in, but operators need
//! to point a fleet elsewhere, pin a platform, or relax TLS for an internal mirror.
//! [`UpdaterConfig`] covers that as a TOML file plus environment overrides.
//!
//! # Locations
//!
//! - **Unix/macOS**: `~/.selfswap/config.toml`
//! - **Windows**: `%LOCALAPPDATA%\selfswap\config.toml`
//! - **Override**: `SELFSWAP_CONFIG_PATH`
//!
//! # Format
//!
//! ```toml
//! base_url = "https://updates.example.com/"
//! app_id = "myapp"
//! # platform = "linux-amd64"
//! check_interval_hours = 24
//! randomize_hours = 2
//! request_timeout_secs = 60
//! accept_invalid_certs = false
//! ```
//!
//! # Environment Overrides
//!
//! Applied by [`UpdaterConfig::apply_env_overrides`]:
//! `SELFSWAP_BASE_URL`, `SELFSWAP_APP_ID`, `SELFSWAP_PLATFORM`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core::SelfswapError;
use crate::platform::Platform;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "SELFSWAP_CONFIG_PATH";

/// Settings for an [`Updater`](crate::updater::Updater) and its background schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Root URL of the update server; manifests live at `{base_url}/{app_id}/...`.
    #[serde(default)]
    pub base_url: String,

    /// Application identifier, the first path segment under `base_url`.
    #[serde(default)]
    pub app_id: String,

    /// Platform id override (`os-arch`). Detected when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Hours between background checks. `0` checks once.
    #[serde(default = "default_check_interval_hours")]
    pub check_interval_hours: u64,

    /// Upper bound, in hours, of the random delay added to each interval.
    ///
    /// Spreads a fleet's checks so a release does not hit the server all at once.
    #[serde(default)]
    pub randomize_hours: u64,

    /// Deadline for each HTTP request, body included.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Skip TLS certificate verification.
    ///
    /// Off by default. Turning it on lets anyone on the network path serve a binary
    /// that will be installed and run; only use it for private mirrors with
    /// self-signed certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

const fn default_check_interval_hours() -> u64 {
    24
}

const fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            app_id: String::new(),
            platform: None,
            check_interval_hours: default_check_interval_hours(),
            randomize_hours: 0,
            request_timeout_secs: default_request_timeout_secs(),
            accept_invalid_certs: false,
        }
    }
}

impl UpdaterConfig {
    /// Configuration for `app_id` served from `base_url`, other settings default.
    pub fn new(base_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            app_id: app_id.into(),
            ..Self::default()
        }
    }

    /// Load from the default location, falling back to defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid TOML for this structure.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read updater config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse updater config from {}", path.display()))
    }

    /// Write as pretty TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if directories cannot be created or the file cannot be written.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize updater config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write updater config to {}", path.display()))
    }

    /// Platform-appropriate config file path, honoring `SELFSWAP_CONFIG_PATH`.
    ///
    /// # Errors
    ///
    /// Fails if the home (or local data) directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("selfswap")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".selfswap")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Overlay `SELFSWAP_BASE_URL`, `SELFSWAP_APP_ID` and `SELFSWAP_PLATFORM`.
    ///
    /// Empty variables are ignored.
    pub fn apply_env_overrides(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(base_url) = var("SELFSWAP_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(app_id) = var("SELFSWAP_APP_ID") {
            self.app_id = app_id;
        }
        if let Some(platform) = var("SELFSWAP_PLATFORM") {
            self.platform = Some(platform);
        }
    }

    /// Check that the settings can build an updater.
    ///
    /// # Errors
    ///
    /// [`SelfswapError::Config`] for an empty base URL or app id, or a malformed
    /// platform override.
    pub fn validate(&self) -> std::result::Result<(), SelfswapError> {
        if self.base_url.trim().is_empty() {
            return Err(SelfswapError::Config {
                message: "base_url is empty".to_string(),
            });
        }
        if self.app_id.trim().is_empty() {
            return Err(SelfswapError::Config {
                message: "app_id is empty".to_string(),
            });
        }
        self.platform()?;
        Ok(())
    }

    /// The configured platform, or the detected one.
    ///
    /// # Errors
    ///
    /// [`SelfswapError::Config`] if the override is not `os-arch`.
    pub fn platform(&self) -> std::result::Result<Platform, SelfswapError> {
        match &self.platform {
            Some(id) => Platform::parse(id),
            None => Ok(Platform::detect()),
        }
    }
}
