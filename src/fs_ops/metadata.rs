//! Metadata preservation for copied files.
//! - Copies owner/group, permissions (mode incl. setuid/setgid/sticky) and timestamps.
//! - Best-effort: failures are logged and ignored (function returns Ok(())).
//! - Ownership goes first because chown clears setuid/setgid bits.

use anyhow::Result;
use filetime::{FileTime, set_file_times};
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use tracing::{trace, warn};

/// Preserve metadata on `dest` using already-fetched `src_meta`.
pub fn preserve_metadata(dest: &Path, src_meta: &fs::Metadata) -> Result<()> {
    // 1) Ownership
    if let Err(e) = std::os::unix::fs::chown(dest, Some(src_meta.uid()), Some(src_meta.gid())) {
        warn!(path = %dest.display(), uid = src_meta.uid(), gid = src_meta.gid(), error = %e, "failed to set owner on destination");
    }

    // 2) Permissions
    let src_mode = src_meta.permissions().mode() & 0o7777;
    if let Err(e) = fs::set_permissions(dest, fs::Permissions::from_mode(src_mode)) {
        warn!(path = %dest.display(), mode = format!("{:o}", src_mode), error = %e, "failed to set permissions on destination");
    } else {
        trace!(path = %dest.display(), mode = format!("{:o}", src_mode), "set permissions on destination");
    }

    // 3) Timestamps (last, so the chmod above does not disturb them)
    let mt = FileTime::from_unix_time(src_meta.mtime(), src_meta.mtime_nsec() as u32);
    let at = FileTime::from_unix_time(src_meta.atime(), src_meta.atime_nsec() as u32);
    if let Err(e) = set_file_times(dest, at, mt) {
        warn!(path = %dest.display(), error = %e, "failed to set atime/mtime on destination");
    }

    Ok(())
}
