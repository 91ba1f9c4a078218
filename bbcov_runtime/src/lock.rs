//! Scoped exclusive lock around a store's read-modify-write.
//!
//! The lock is an advisory `flock` on a sibling `<store>.lock` file so the
//! store itself can be truncated and rewritten while it is held. Dropping the
//! guard releases it. On targets without `flock` the guard is a no-op.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub const LOCK_SUFFIX: &str = ".lock";

/// Path of the lock file guarding `store`.
pub fn lock_path(store: &Path) -> PathBuf {
    let mut path = OsString::from(store.as_os_str());
    path.push(LOCK_SUFFIX);
    PathBuf::from(path)
}

#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Block until the exclusive lock for `store` is held.
    pub fn acquire(store: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path(store))?;
        platform::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        platform::unlock(&self.file);
    }
}

#[cfg(unix)]
mod platform {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    pub fn lock_exclusive(file: &File) -> io::Result<()> {
        loop {
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub fn unlock(file: &File) {
        unsafe {
            libc::flock(file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

#[cfg(not(unix))]
mod platform {
    use std::fs::File;
    use std::io;

    pub fn lock_exclusive(_file: &File) -> io::Result<()> {
        Ok(())
    }

    pub fn unlock(_file: &File) {}
}
