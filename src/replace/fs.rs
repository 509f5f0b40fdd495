//! Filesystem operations used by the replacement transaction.
//!
//! The transaction only needs three primitives. Routing them through [`SwapFs`] keeps
//! the state machine testable: a test double can fail any single step and the
//! recovery path runs for real against a temp directory.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Primitive file operations performed during a swap.
pub trait SwapFs: Send + Sync {
    /// Write `image` to `path`, copying the permission bits of `like`.
    ///
    /// The file must be closed when this returns; Windows refuses to rename open files.
    fn write_staged(&self, path: &Path, image: &[u8], like: &Path) -> io::Result<()>;

    /// Rename `from` to `to` within one directory.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Delete a file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// [`SwapFs`] on the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFs;

impl SwapFs for StdFs {
    fn write_staged(&self, path: &Path, image: &[u8], like: &Path) -> io::Result<()> {
        let permissions = fs::metadata(like)?.permissions();

        // A read-only leftover from an interrupted run would refuse the open below
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        {
            let mut file = fs::OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
            file.write_all(image)?;
            file.sync_all()?;
        }

        fs::set_permissions(path, permissions)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

impl<T: SwapFs + ?Sized> SwapFs for std::sync::Arc<T> {
    fn write_staged(&self, path: &Path, image: &[u8], like: &Path) -> io::Result<()> {
        (**self).write_staged(path, image, like)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        (**self).rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        (**self).remove_file(path)
    }
}
