//! I/O helper utilities.
//!
//! Provides a small adapter to enrich io::Error with actionable context/hints
//! for anyhow::Result code paths.
//!
//! Usage:
//!   fs::create_dir(dir).map_err(io_error_with_help("create dir", dir))?;

use anyhow::anyhow;
use std::io;
use std::path::Path;

/// Format a human-friendly message with op/path plus errno-aware hints.
fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);

    if let Some(code) = e.raw_os_error() {
        let hint = match code {
            libc::EACCES | libc::EPERM => Some("permission denied; run as root or check ownership"),
            libc::EXDEV => Some("cross-filesystem; atomic rename or hard link not possible"),
            libc::EBUSY => Some("resource busy; is this path a mount point?"),
            libc::ENOENT => Some("path not found; was it removed concurrently?"),
            libc::EEXIST => Some("already exists"),
            libc::ENOTEMPTY => Some("directory not empty"),
            libc::ENOSPC => Some("insufficient space on device"),
            libc::EROFS => Some("read-only filesystem; remount read-write first"),
            libc::ELOOP => Some("too many symbolic link levels; possible symlink cycle"),
            libc::EMLINK => Some("too many hard links to the source file"),
            libc::ENAMETOOLONG => Some("filename or path too long"),
            _ => None,
        };
        if let Some(hint) = hint {
            msg.push_str(" (");
            msg.push_str(hint);
            msg.push(')');
        }
        msg.push_str(&format!(" [os code: {code}]"));
    }

    msg
}

/// Adapter for anyhow::Result code.
/// Returns a closure suitable for `.map_err(...)` that converts io::Error -> anyhow::Error.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!(build_message(op, path, &e))
}
