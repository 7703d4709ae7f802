//! Atomic rename helper.
//! - Performs a rename; the caller inspects the io::Error (EXDEV etc).
//! - Best-effort fsync of the destination directory after rename.

use std::fs;
use std::io;
use std::path::Path;
use tracing::trace;

use super::staging::fsync_dir;

pub fn try_atomic_move(src: &Path, dst: &Path) -> io::Result<()> {
    fs::rename(src, dst)?;

    // Ignore fsync errors to avoid turning a successful rename into a failure.
    if let Some(parent) = dst.parent() {
        if let Err(e) = fsync_dir(parent) {
            trace!(dir = %parent.display(), error = %e, "fsync after rename failed");
        }
    }
    Ok(())
}
