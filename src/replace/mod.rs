//! Transactional replacement of the running executable.
//!
//! Replacing a binary while it runs is constrained differently per platform. Unix lets
//! a new inode take over the path of an open executable; Windows refuses to overwrite
//! or delete a mapped image but does allow renaming it. The transaction therefore never
//! writes to the canonical path directly. It only renames within one directory:
//!
//! ```text
//! 1. Stage     image  -> .{name}.new        (original untouched on failure)
//! 2. Evacuate  {name} -> .{name}.old        (point of no return)
//! 3. Promote   .{name}.new -> {name}
//!      ok   -> delete .{name}.old, or hide it if deletion is refused
//!      fail -> Recover .{name}.old -> {name}
//!                ok   -> SelfswapError::Swap      (old binary intact)
//!                fail -> SelfswapError::FatalSwap (both causes kept)
//! ```
//!
//! All three paths share a directory, so every rename stays on one filesystem and is
//! atomic on POSIX. The canonical path never holds a partially written file.

mod fs;


pub use fs::{StdFs, SwapFs};

use crate::core::{Result, SelfswapError};
use crate::hide::HideFile;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// The three paths a replacement transaction works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementPaths {
    /// Canonical executable path
    pub original: PathBuf,
    /// `.{name}.new`, where the replacement is written first
    pub staged: PathBuf,
    /// `.{name}.old`, where the running executable is moved aside
    pub backup: PathBuf,
}

impl ReplacementPaths {
    /// Derive staging and backup paths beside `executable`.
    ///
    /// # Errors
    ///
    /// [`SelfswapError::Executable`] if the path has no file name.
    pub fn new(executable: &Path) -> Result<Self> {
        let name = executable.file_name().ok_or_else(|| SelfswapError::Executable {
            reason: format!("{} has no file name", executable.display()),
        })?;
        let name = name.to_string_lossy();
        let dir = executable.parent().unwrap_or_else(|| Path::new(""));

        Ok(Self {
            original: executable.to_path_buf(),
            staged: dir.join(format!(".{name}.new")),
            backup: dir.join(format!(".{name}.old")),
        })
    }
}

/// What happened to the backup after a successful swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupDisposition {
    /// Deleted
    Removed,
    /// Could not be deleted and was marked hidden
    Hidden,
    /// Could neither be deleted nor hidden; still on disk
    Left,
}

/// Where a transaction stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransactionState {
    /// Nothing written yet
    Idle,
    /// Replacement written to the staging path
    Staged,
    /// Running executable moved to the backup path
    Evacuated,
    /// Replacement occupies the canonical path
    Committed,
    /// Promotion failed and the original was put back
    RolledBack,
    /// Promotion and recovery both failed
    Broken,
}

/// Runs replacement transactions against one filesystem and hide capability.
pub struct Replacer<'a> {
    fs: &'a dyn SwapFs,
    hider: &'a dyn HideFile,
}

impl<'a> Replacer<'a> {
    /// Create a replacer.
    pub fn new(fs: &'a dyn SwapFs, hider: &'a dyn HideFile) -> Self {
        Self {
            fs,
            hider,
        }
    }

    /// Replace `executable` with `image`.
    ///
    /// `executable` must already be symlink-free; the swap renames whatever sits at
    /// that exact path.
    ///
    /// # Errors
    ///
    /// [`SelfswapError::Stage`], [`SelfswapError::Evacuate`], [`SelfswapError::Swap`],
    /// or [`SelfswapError::FatalSwap`]. Only the last leaves the canonical path
    /// possibly empty.
    pub fn replace(&self, executable: &Path, image: &[u8]) -> Result<BackupDisposition> {
        let paths = ReplacementPaths::new(executable)?;
        let mut transaction = Transaction {
            paths: &paths,
            fs: self.fs,
            hider: self.hider,
            state: TransactionState::Idle,
        };

        let result = transaction.run(image);
        debug!("Replacement of {} ended in state {:?}", paths.original.display(), transaction.state);
        result
    }
}

struct Transaction<'a> {
    paths: &'a ReplacementPaths,
    fs: &'a dyn SwapFs,
    hider: &'a dyn HideFile,
    state: TransactionState,
}

impl Transaction<'_> {
    fn run(&mut self, image: &[u8]) -> Result<BackupDisposition> {
        self.stage(image)?;
        self.evacuate()?;
        self.promote()
    }

    fn stage(&mut self, image: &[u8]) -> Result<()> {
        let staged = &self.paths.staged;
        debug!("Staging {} bytes at {}", image.len(), staged.display());

        if let Err(source) = self.fs.write_staged(staged, image, &self.paths.original) {
            self.discard(staged);
            return Err(SelfswapError::Stage {
                path: staged.clone(),
                source,
            });
        }

        self.state = TransactionState::Staged;
        Ok(())
    }

    fn evacuate(&mut self) -> Result<()> {
        let backup = &self.paths.backup;

        // Windows cannot rename onto an existing file, and a previous update may have
        // left a backup it could not delete at the time.
        match self.fs.remove_file(backup) {
            Ok(()) => debug!("Removed stale backup {}", backup.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove stale backup {}: {}", backup.display(), e),
        }

        if let Err(source) = self.fs.rename(&self.paths.original, backup) {
            self.discard(&self.paths.staged);
            return Err(SelfswapError::Evacuate {
                path: self.paths.original.clone(),
                source,
            });
        }

        self.state = TransactionState::Evacuated;
        Ok(())
    }

    fn promote(&mut self) -> Result<BackupDisposition> {
        let original = &self.paths.original;

        match self.fs.rename(&self.paths.staged, original) {
            Ok(()) => {
                self.state = TransactionState::Committed;
                info!("Installed new binary at {}", original.display());
                Ok(self.clean_backup())
            }
            Err(swap_error) => {
                warn!("Failed to install new binary at {}: {}", original.display(), swap_error);
                self.recover(swap_error)
            }
        }
    }

    fn recover(&mut self, swap_error: io::Error) -> Result<BackupDisposition> {
        let original = &self.paths.original;

        match self.fs.rename(&self.paths.backup, original) {
            Ok(()) => {
                self.state = TransactionState::RolledBack;
                info!("Restored previous binary at {}", original.display());
                self.discard(&self.paths.staged);
                Err(SelfswapError::Swap {
                    path: original.clone(),
                    source: swap_error,
                })
            }
            Err(recovery_error) => {
                self.state = TransactionState::Broken;
                error!(
                    "Failed to restore previous binary to {} (update error: {}; recovery error: {}); \
                     it remains at {}",
                    original.display(),
                    swap_error,
                    recovery_error,
                    self.paths.backup.display()
                );
                Err(SelfswapError::FatalSwap {
                    path: original.clone(),
                    swap_error,
                    recovery_error,
                })
            }
        }
    }

    fn clean_backup(&self) -> BackupDisposition {
        let backup = &self.paths.backup;

        let remove_error = match self.fs.remove_file(backup) {
            Ok(()) => return BackupDisposition::Removed,
            Err(e) => e,
        };
        debug!("Could not delete {} ({}), hiding it", backup.display(), remove_error);

        match self.hider.hide(backup) {
            Ok(()) => BackupDisposition::Hidden,
            Err(e) => {
                warn!("Could not delete or hide {}: {}", backup.display(), e);
                BackupDisposition::Left
            }
        }
    }

    fn discard(&self, path: &Path) {
        match self.fs.remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}

/// Check that the executable's directory accepts new files.
///
/// Creates and deletes the staging file, so a permission problem surfaces before any
/// download starts. A staging file left behind by an earlier run is removed first.
///
/// # Errors
///
/// [`SelfswapError::NotWritable`] if the staging file cannot be created.
pub fn probe_writable(paths: &ReplacementPaths) -> Result<()> {
    // A read-only leftover from an interrupted run would fail the open below even
    // though the directory itself is writable
    match std::fs::remove_file(&paths.staged) {
        Ok(()) => debug!("Removed leftover staging file {}", paths.staged.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(SelfswapError::NotWritable {
                path: paths.staged.clone(),
                source,
            });
        }
    }

    std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&paths.staged)
        .map_err(|source| SelfswapError::NotWritable {
            path: paths.staged.clone(),
            source,
        })?;

    if let Err(e) = std::fs::remove_file(&paths.staged) {
        warn!("Could not remove probe file {}: {}", paths.staged.display(), e);
    }
    Ok(())
}
