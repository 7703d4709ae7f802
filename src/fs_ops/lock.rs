//! Advisory run lock.
//! Ensures only one merge operates on a root at a time.
//!
//! Design:
//! - We flock(LOCK_EX | LOCK_NB) a descriptor opened on the root directory itself.
//!   No lock file is created, so a dry-run leaves the tree untouched.
//! - The lock is released when the RunLock guard is dropped (or the process exits).

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::errors::UsrMergeError;

/// RAII guard held while the run lock is active.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // flock also releases on close; unlock explicitly to make it prompt.
        let _ = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        trace!(path = %self.path.display(), "run lock released");
    }
}

/// Try to take the run lock on `root` without blocking.
/// Fails with `UsrMergeError::Locked` when another process holds it.
pub fn acquire_run_lock(root: &Path) -> anyhow::Result<RunLock> {
    let file = File::open(root)?;
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            return Err(UsrMergeError::Locked(root.to_path_buf()).into());
        }
        return Err(err.into());
    }
    trace!(path = %root.display(), "run lock acquired");
    Ok(RunLock {
        file,
        path: root.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_lock_on_same_root_is_refused() {
        let td = tempdir().unwrap();
        let first = acquire_run_lock(td.path()).unwrap();
        let err = acquire_run_lock(td.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UsrMergeError>(),
            Some(UsrMergeError::Locked(_))
        ));
        drop(first);
        acquire_run_lock(td.path()).unwrap();
    }
}
