//! File-based locking to prevent concurrent execution.
//!
//! Uses flock-style advisory locking so that only one run writes into an
//! output directory at a time.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

pub const LOCK_FILE_NAME: &str = ".wlmerge.lock";

/// A guard that holds an exclusive lock on the output directory's lock file.
/// The lock is automatically released when the guard is dropped.
#[derive(Debug)]
pub struct LockGuard {
    _file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Attempt to acquire an exclusive lock in `dir`, creating it if needed.
    /// Returns an error if another instance holds the lock.
    pub fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        let path = dir.join(LOCK_FILE_NAME);

        // Open without truncating so an existing holder is not disturbed
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {:?}", path))?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "Another wlmerge run is already using {:?}.\n\
                 If you believe this is an error, remove the lock file: {:?}",
                dir,
                path
            )
        })?;

        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// Lock is automatically released when file is closed (on drop)

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_acquire_release() {
        let dir = tempdir().unwrap();
        let guard = LockGuard::acquire(dir.path()).unwrap();
        assert!(guard.path().exists());
        drop(guard);
        assert!(LockGuard::acquire(dir.path()).is_ok());
    }

    #[test]
    fn test_second_lock_fails() {
        let dir = tempdir().unwrap();
        let _guard = LockGuard::acquire(dir.path()).unwrap();
        let err = LockGuard::acquire(dir.path()).unwrap_err();
        assert!(err.to_string().contains("already using"));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("out/confs");
        let _guard = LockGuard::acquire(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
