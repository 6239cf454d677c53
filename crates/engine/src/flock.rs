//! Advisory lock on the data directory.
//!
//! Two engine instances sharing a directory would corrupt each other; the
//! lock file turns that mistake into a failed `open`. The lock is
//! released when the handle closes (shutdown or drop), and the file is
//! left behind on purpose: removing it would race a concurrent open.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Holds an exclusive advisory lock for its lifetime. The file records
/// the owning process id for operators poking around the data directory.
pub(crate) struct LockFile {
    _file: File,
}

impl LockFile {
    pub(crate) fn acquire(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Self::try_exclusive(&file)?;

        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self { _file: file })
    }

    #[cfg(unix)]
    fn try_exclusive(file: &File) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    // Other platforms fall back to no enforcement; the directory contract
    // still forbids sharing.
    #[cfg(not(unix))]
    fn try_exclusive(_file: &File) -> io::Result<()> {
        Ok(())
    }
}
