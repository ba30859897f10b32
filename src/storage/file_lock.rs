use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use crate::core::error::{Error, Result};
use crate::storage::layout::StorageLayout;

/// Single writer guarantee across processes
///
/// Held for the lifetime of an open engine; released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    pub fn acquire(storage: &StorageLayout) -> Result<Self> {
        let path = storage.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        #[cfg(unix)]
        {
            use libc::{LOCK_EX, LOCK_NB, flock};
            use std::os::unix::io::AsRawFd;

            let fd = file.as_raw_fd();
            // SAFETY: fd is a valid descriptor owned by `file` for this call.
            let rc = unsafe { flock(fd, LOCK_EX | LOCK_NB) };
            if rc != 0 {
                return Err(Error::Locked(storage.base_dir.clone()));
            }
        }

        Ok(FileLock { file, path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use libc::{LOCK_UN, flock};
            use std::os::unix::io::AsRawFd;

            let fd = self.file.as_raw_fd();
            // SAFETY: the descriptor is still open until `file` drops.
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}
