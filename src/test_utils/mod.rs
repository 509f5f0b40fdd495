//! Test utilities for selfswap
//!
//! Fakes for every capability the updater is built from, so tests can run a complete
//! update cycle inside a temp directory:
//!
//! - [`MemoryFetcher`] - URL → bytes map that records every request
//! - [`FaultyFs`] - real filesystem operations with injectable failures
//! - [`RecordingHider`] - remembers which paths were hidden, optionally failing
//!
//! # Example
//!
//! ```rust,no_run
//! use selfswap::platform::Platform;
//! use selfswap::test_utils::MemoryFetcher;
//!
//! let fetcher = MemoryFetcher::new().with_release(
//!     "http://updates.test",
//!     "myapp",
//!     &Platform::new("linux", "amd64"),
//!     "1.2.0",
//!     b"new image",
//! );
//! assert!(fetcher.requests().is_empty());
//! ```

use crate::artifact::artifact_url;
use crate::core::{Result, SelfswapError};
use crate::decode::{DEFAULT_LEVEL, encode_artifact};
use crate::fetch::{FetchBody, Fetcher};
use crate::hide::HideFile;
use crate::manifest::{VersionManifest, manifest_url};
use crate::platform::Platform;
use crate::replace::{StdFs, SwapFs};
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG` if set, otherwise stays silent.
///
/// ```bash
/// RUST_LOG=selfswap=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Compress `image` the way the packager does.
pub fn compress(image: &[u8]) -> Vec<u8> {
    encode_artifact(image, DEFAULT_LEVEL).expect("zstd compression of an in-memory buffer")
}

/// Write a fake executable with `content` and mode 0755.
pub fn fake_executable(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    path
}

/// Names of entries in `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// In-memory [`Fetcher`].
///
/// Unknown URLs answer with a 404 [`SelfswapError::HttpStatus`].
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    /// Empty fetcher; every URL is a 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`.
    pub fn with_body(self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.insert(url, body);
        self
    }

    /// Fail requests to `url` with a transport error.
    pub fn with_failure(self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.lock().unwrap().insert(url.into(), reason.into());
        self
    }

    /// Serve a manifest advertising `version` and the matching compressed artifact.
    pub fn with_release(
        self,
        base_url: &str,
        app_id: &str,
        platform: &Platform,
        version: &str,
        image: &[u8],
    ) -> Self {
        self.publish(base_url, app_id, platform, version, image);
        self
    }

    /// Replace or add the body served at `url`.
    pub fn insert(&self, url: impl Into<String>, body: Vec<u8>) {
        self.bodies.lock().unwrap().insert(url.into(), body);
    }

    /// Publish a release on an already shared fetcher.
    pub fn publish(
        &self,
        base_url: &str,
        app_id: &str,
        platform: &Platform,
        version: &str,
        image: &[u8],
    ) {
        let manifest = VersionManifest::new(version).to_json_pretty().unwrap();
        self.insert(manifest_url(base_url, app_id, platform), manifest.into_bytes());
        self.insert(artifact_url(base_url, app_id, version, platform), compress(image));
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<FetchBody> {
        self.requests.lock().unwrap().push(url.to_string());

        if let Some(reason) = self.failures.lock().unwrap().get(url) {
            return Err(SelfswapError::Fetch {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }

        match self.bodies.lock().unwrap().get(url) {
            Some(body) => Ok(Box::new(Cursor::new(body.clone()))),
            None => Err(SelfswapError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// [`SwapFs`] over the real filesystem that can be told to fail.
///
/// Renames are counted from 1 across the lifetime of the value. In a transaction the
/// first rename evacuates, the second promotes and the third recovers.
#[derive(Debug, Default)]
pub struct FaultyFs {
    inner: StdFs,
    renames: AtomicUsize,
    failing_renames: Mutex<HashSet<usize>>,
    failing_removes: Mutex<HashSet<PathBuf>>,
    fail_writes: Mutex<bool>,
    operations: Mutex<Vec<String>>,
}

impl FaultyFs {
    /// Pass-through filesystem with no failures armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th rename (1-based).
    pub fn fail_rename(self, n: usize) -> Self {
        self.failing_renames.lock().unwrap().insert(n);
        self
    }

    /// Fail every removal of `path`.
    pub fn fail_remove(self, path: impl Into<PathBuf>) -> Self {
        self.failing_removes.lock().unwrap().insert(path.into());
        self
    }

    /// Fail every staged write.
    pub fn fail_writes(self) -> Self {
        *self.fail_writes.lock().unwrap() = true;
        self
    }

    /// Log of attempted operations, e.g. `rename /a -> /b`.
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().unwrap().clone()
    }

    fn record(&self, operation: String) {
        self.operations.lock().unwrap().push(operation);
    }
}

impl SwapFs for FaultyFs {
    fn write_staged(&self, path: &Path, image: &[u8], like: &Path) -> io::Result<()> {
        self.record(format!("write {}", path.display()));
        if *self.fail_writes.lock().unwrap() {
            return Err(io::Error::new(io::ErrorKind::StorageFull, "injected write failure"));
        }
        self.inner.write_staged(path, image, like)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let n = self.renames.fetch_add(1, Ordering::SeqCst) + 1;
        self.record(format!("rename {} -> {}", from.display(), to.display()));
        if self.failing_renames.lock().unwrap().contains(&n) {
            return Err(io::Error::other(format!("injected rename failure #{n}")));
        }
        self.inner.rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.record(format!("remove {}", path.display()));
        if self.failing_removes.lock().unwrap().contains(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected remove failure"));
        }
        self.inner.remove_file(path)
    }
}

/// [`HideFile`] that records its calls.
#[derive(Debug, Default)]
pub struct RecordingHider {
    hidden: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl RecordingHider {
    /// Hider that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hider that always fails.
    pub fn failing() -> Self {
        Self {
            hidden: Mutex::default(),
            fail: true,
        }
    }

    /// Paths passed to [`HideFile::hide`], in order.
    pub fn hidden(&self) -> Vec<PathBuf> {
        self.hidden.lock().unwrap().clone()
    }
}

impl HideFile for RecordingHider {
    fn hide(&self, path: &Path) -> io::Result<()> {
        self.hidden.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            return Err(io::Error::other("injected hide failure"));
        }
        Ok(())
    }
}
