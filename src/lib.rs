//! selfswap - self-update for running executables
//!
//! An application embeds an [`Updater`](updater::Updater) that periodically asks an
//! HTTP server which version it should be running, downloads the matching
//! zstd-compressed binary, and swaps it in place of the running executable.
//!
//! # Server Layout
//!
//! ```text
//! GET {base_url}/{app_id}/{os}-{arch}.json            {"Version": "1.2.0"}
//! GET {base_url}/{app_id}/{version}/{os}-{arch}.zst   zstd-compressed binary
//! ```
//!
//! The `selfswap-pack` binary ([`publish`]) produces exactly these files.
//!
//! # Update Cycle
//!
//! 1. [`decision`] - a running version of `"dev"` disables updates entirely
//! 2. [`manifest`] - resolve the advertised version
//! 3. [`decision`] - exact string comparison with the running version
//! 4. [`artifact`] - download and decompress ([`decode`]) the new binary into memory
//! 5. [`replace`] - stage `.{name}.new`, move the running binary to `.{name}.old`,
//!    rename the new one into place, and roll back if that last step fails
//! 6. [`hide`] - a backup the OS will not delete yet is hidden instead
//!
//! # Core Modules
//!
//! - [`core`] - error types and operator-facing error rendering
//! - [`config`] - TOML configuration with environment overrides
//! - [`platform`] - `{os}-{arch}` identifiers
//! - [`fetch`] - the injectable fetch capability and its HTTP implementation
//! - [`updater`] - the update session tying everything together
//! - [`scheduler`] - periodic background checks on tokio
//! - [`cli`] - argument parsing for `selfswap-pack`
//!
//! # Example
//!
//! ```rust,no_run
//! use selfswap::config::UpdaterConfig;
//! use selfswap::scheduler::{Schedule, spawn_periodic};
//! use selfswap::updater::Updater;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut config = UpdaterConfig::load().await?;
//! config.apply_env_overrides();
//!
//! let updater = Updater::from_config(env!("CARGO_PKG_VERSION"), &config)?;
//! let handle = spawn_periodic(updater, Schedule::from_config(&config));
//! # drop(handle);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod cli;
pub mod config;
pub mod core;
pub mod decision;
pub mod decode;
pub mod fetch;
pub mod hide;
pub mod manifest;
pub mod platform;
pub mod publish;
pub mod replace;
pub mod scheduler;
pub mod updater;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
