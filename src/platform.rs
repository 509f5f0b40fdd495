//! Platform identifiers used in manifest and artifact URLs.
//!
//! A platform id has the form `{os}-{arch}` (e.g. `linux-amd64`). Names follow the
//! convention already used by published update servers, so Rust's target names are
//! translated: `macos` becomes `darwin`, `x86_64` becomes `amd64`, `aarch64` becomes
//! `arm64` and `x86` becomes `386`.
//!
//! Detection can be overridden by setting both `SELFSWAP_OS` and `SELFSWAP_ARCH`,
//! which is how cross-compiled artifacts get published from a build host.

use crate::core::{Result, SelfswapError};
use std::fmt;

/// Environment variable overriding the detected OS name.
pub const OS_ENV: &str = "SELFSWAP_OS";
/// Environment variable overriding the detected architecture name.
pub const ARCH_ENV: &str = "SELFSWAP_ARCH";

/// An `{os}-{arch}` pair identifying which artifact a binary needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Build a platform from explicit names.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Platform of the running process, honoring the environment override.
    ///
    /// The override only applies when both variables are set and non-empty.
    pub fn detect() -> Self {
        let env_os = std::env::var(OS_ENV).ok().filter(|v| !v.is_empty());
        let env_arch = std::env::var(ARCH_ENV).ok().filter(|v| !v.is_empty());

        match (env_os, env_arch) {
            (Some(os), Some(arch)) => Self::new(os, arch),
            _ => Self::current(),
        }
    }

    /// Platform of the running process from compile-time target info only.
    pub fn current() -> Self {
        Self::new(
            os_name(std::env::consts::OS),
            arch_name(std::env::consts::ARCH),
        )
    }

    /// Parse an `{os}-{arch}` string.
    ///
    /// Splits on the first `-`; both halves must be non-empty.
    pub fn parse(id: &str) -> Result<Self> {
        match id.split_once('-') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() => Ok(Self::new(os, arch)),
            _ => Err(SelfswapError::Config {
                message: format!("invalid platform '{id}', expected OS-ARCH (e.g. linux-amd64)"),
            }),
        }
    }

    /// The OS half of the id.
    pub fn os(&self) -> &str {
        &self.os
    }

    /// The architecture half of the id.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// The `{os}-{arch}` string used in URLs and file names.
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

fn os_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        other => other,
    }
}
