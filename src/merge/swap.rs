//! Replace a fully merged legacy directory with a symlink to its canonical location.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::Path;
use tracing::{debug, info, trace, warn};

use crate::fs_ops::helpers::io_error_with_help;
use crate::fs_ops::staging::{fsync_dir, is_cross_device, staging_path};
use crate::fs_ops::xattrs;

use super::resolve::relative_path;

/// How the source path was vacated before the symlink went in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapMethod {
    /// Renamed aside to a staging sibling, then removed.
    Renamed,
    /// Rename crossed a filesystem boundary; the tree was deleted in place.
    Deleted,
}

/// The two calls a swap can fail in; tests substitute failing versions.
#[derive(Clone, Copy)]
struct SwapCalls {
    rename: fn(&Path, &Path) -> io::Result<()>,
    symlink: fn(&Path, &Path) -> io::Result<()>,
}

const SYSTEM_CALLS: SwapCalls = SwapCalls {
    rename: |from, to| fs::rename(from, to),
    symlink: |target, link| symlink(target, link),
};

#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicSwapper;

impl AtomicSwapper {
    pub fn new() -> Self {
        Self
    }

    /// Turn directory `src` into a relative symlink pointing at `dst`.
    ///
    /// The caller guarantees every entry below `src` already lives in `dst`.
    /// If the symlink cannot be created after a rename, the directory is
    /// renamed back and the error returned.
    pub fn promote(&self, src: &Path, dst: &Path) -> Result<SwapMethod> {
        promote_with(SYSTEM_CALLS, src, dst)
    }
}

fn promote_with(calls: SwapCalls, src: &Path, dst: &Path) -> Result<SwapMethod> {
    let parent = src
        .parent()
        .ok_or_else(|| anyhow!("cannot promote a path without a parent: {}", src.display()))?;
    let target = relative_path(dst, parent);
    let attrs = xattrs::capture(src);

    let staged = staging_path(parent);
    let (method, aside) = match (calls.rename)(src, &staged) {
        Ok(()) => {
            trace!(src = %src.display(), staged = %staged.display(), "directory moved aside");
            (SwapMethod::Renamed, Some(staged))
        }
        Err(e) if is_cross_device(&e) => {
            debug!(src = %src.display(), "rename crosses filesystems; deleting merged tree in place");
            fs::remove_dir_all(src)
                .with_context(|| format!("remove merged directory {}", src.display()))?;
            (SwapMethod::Deleted, None)
        }
        Err(e) => return Err(io_error_with_help("move directory aside", src)(e)),
    };

    if let Err(e) = (calls.symlink)(&target, src) {
        let err = io_error_with_help("create directory symlink", src)(e);
        return Err(match aside {
            Some(staged) => restore(&staged, src, err),
            None => err,
        });
    }
    xattrs::apply(src, &attrs);

    if let Some(staged) = aside {
        if let Err(e) = fs::remove_dir_all(&staged) {
            warn!(path = %staged.display(), error = %e, "failed to remove staged directory; remove it manually");
        }
    }
    if let Err(e) = fsync_dir(parent) {
        trace!(dir = %parent.display(), error = %e, "fsync after promote failed");
    }

    info!(src = %src.display(), target = %target.display(), ?method, "directory replaced by symlink");
    Ok(method)
}

fn restore(staged: &Path, src: &Path, cause: anyhow::Error) -> anyhow::Error {
    match fs::rename(staged, src) {
        Ok(()) => cause.context(format!("symlink not created; {} restored", src.display())),
        Err(e) => cause.context(format!(
            "symlink not created and restoring {} from {} failed: {e}",
            src.display(),
            staged.display()
        )),
    }
}
