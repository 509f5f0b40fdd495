//! Hiding leftover backup files.
//!
//! Windows will not delete an executable image that a running process still maps, so
//! after a successful swap the `.old` backup may outlive its deletion attempt. It gets
//! the hidden attribute instead. Other platforms can always delete it, and have no
//! hidden attribute beyond the leading dot the backup name already carries, so
//! hiding is a successful no-op there.

use std::io;
use std::path::Path;

/// Mark a file hidden.
pub trait HideFile: Send + Sync {
    /// Hide `path`.
    ///
    /// Failures are reported but callers treat them as cosmetic.
    fn hide(&self, path: &Path) -> io::Result<()>;
}

impl<T: HideFile + ?Sized> HideFile for std::sync::Arc<T> {
    fn hide(&self, path: &Path) -> io::Result<()> {
        (**self).hide(path)
    }
}

/// [`HideFile`] for the platform the crate was built for.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformHider;

#[cfg(windows)]
impl HideFile for PlatformHider {
    fn hide(&self, path: &Path) -> io::Result<()> {
        use std::os::windows::ffi::OsStrExt;
        use windows::Win32::Storage::FileSystem::{FILE_ATTRIBUTE_HIDDEN, SetFileAttributesW};
        use windows::core::PCWSTR;

        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();

        // SAFETY: `wide` is NUL-terminated and outlives the call.
        unsafe { SetFileAttributesW(PCWSTR(wide.as_ptr()), FILE_ATTRIBUTE_HIDDEN) }
            .map_err(io::Error::other)
    }
}

#[cfg(not(windows))]
impl HideFile for PlatformHider {
    fn hide(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hide_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".app.old");
        std::fs::write(&path, b"old").unwrap();

        PlatformHider.hide(&path).unwrap();

        // Hiding never removes or alters content
        assert_eq!(std::fs::read(&path).unwrap(), b"old");
    }

    #[cfg(windows)]
    #[test]
    fn test_hide_sets_attribute() {
        use std::os::windows::fs::MetadataExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".app.old");
        std::fs::write(&path, b"old").unwrap();

        PlatformHider.hide(&path).unwrap();

        let attributes = std::fs::metadata(&path).unwrap().file_attributes();
        assert_ne!(attributes & 0x2, 0);
    }

    #[cfg(windows)]
    #[test]
    fn test_hide_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(PlatformHider.hide(&temp_dir.path().join("missing")).is_err());
    }
}
