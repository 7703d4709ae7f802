//! Relocating single entries into the destination tree.
//!
//! Regular file:
//!   1. hard link (or, across filesystems, copy) the source to a staging name
//!      in the destination directory
//!   2. rename the staging entry onto the destination name
//!   3. only then replace the source with a symlink to the destination, again
//!      via a staging name in the source directory, and reapply the source's
//!      extended attributes to that symlink
//!
//! Symlink: recreate the link at the destination, rewriting a relative target
//! so it still points at the same object after relocation.

use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::fs_ops::helpers::io_error_with_help;
use crate::fs_ops::staging::create_staged;
use crate::fs_ops::{io_copy, metadata, try_atomic_move, xattrs};

use super::resolve::{normalize_lexically, relative_path};

/// Environment switch that disables the hard-link attempt.
pub const FORCE_COPY_ENV: &str = "USR_MERGE_FORCE_COPY";

/// How a regular file reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMethod {
    HardLink,
    Copy,
}

#[derive(Debug, Clone, Default)]
pub struct FileTransfer {
    force_copy: bool,
}

impl FileTransfer {
    /// Reads `USR_MERGE_FORCE_COPY` once.
    pub fn from_env() -> Self {
        let force_copy = env::var_os(FORCE_COPY_ENV).is_some_and(|v| !v.is_empty() && v != "0");
        Self { force_copy }
    }

    pub fn with_force_copy(force_copy: bool) -> Self {
        Self { force_copy }
    }

    /// Move the regular file `src` to `dst` and leave a symlink to `dst` behind.
    pub fn transfer_file(&self, src: &Path, dst: &Path) -> Result<TransferMethod> {
        let src_dir = src
            .parent()
            .ok_or_else(|| anyhow!("source has no parent: {}", src.display()))?;
        let dst_dir = dst
            .parent()
            .ok_or_else(|| anyhow!("destination has no parent: {}", dst.display()))?;
        let src_meta = fs::symlink_metadata(src).map_err(io_error_with_help("stat source", src))?;

        let (staged, method) = self.stage_file(src, &src_meta, dst_dir)?;
        if let Err(e) = try_atomic_move(&staged, dst) {
            let _ = fs::remove_file(&staged);
            return Err(io_error_with_help("rename staged file into place", dst)(e));
        }
        // rename() is a no-op when both names already share an inode.
        if fs::symlink_metadata(&staged).is_ok() {
            let _ = fs::remove_file(&staged);
        }
        debug!(src = %src.display(), dst = %dst.display(), ?method, "file placed at destination");

        let attrs = xattrs::capture(src);
        let link_target = relative_path(dst, src_dir);
        let staged_link = create_staged(src_dir, |p| symlink(&link_target, p))
            .map_err(io_error_with_help("create staging symlink", src_dir))?;
        if let Err(e) = try_atomic_move(&staged_link, src) {
            let _ = fs::remove_file(&staged_link);
            return Err(io_error_with_help("replace source with symlink", src)(e));
        }
        xattrs::apply(src, &attrs);
        trace!(src = %src.display(), target = %link_target.display(), "source replaced by symlink");
        Ok(method)
    }

    fn stage_file(&self, src: &Path, src_meta: &fs::Metadata, dst_dir: &Path) -> Result<(PathBuf, TransferMethod)> {
        if !self.force_copy {
            match create_staged(dst_dir, |p| fs::hard_link(src, p)) {
                Ok(p) => return Ok((p, TransferMethod::HardLink)),
                Err(e) if link_unsupported(&e) => {
                    debug!(src = %src.display(), error = %e, "hard link not possible; copying instead");
                }
                Err(e) => return Err(io_error_with_help("hard link into destination", dst_dir)(e)),
            }
        }

        let staged = create_staged(dst_dir, |p| match io_copy::copy_streaming(src, p) {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.kind() != io::ErrorKind::AlreadyExists {
                    let _ = fs::remove_file(p);
                }
                Err(e)
            }
        })
        .map_err(io_error_with_help("copy into destination", dst_dir))?;

        metadata::preserve_metadata(&staged, src_meta)
            .with_context(|| format!("preserve metadata for {}", staged.display()))?;
        xattrs::copy(src, &staged);
        Ok((staged, TransferMethod::Copy))
    }

    /// Recreate the symlink `src` at `dst`. `top_src` is the top-level source
    /// directory of the mapping being merged. Returns the target written.
    pub fn transfer_symlink(&self, src: &Path, dst: &Path, top_src: &Path) -> Result<PathBuf> {
        let target = fs::read_link(src).map_err(io_error_with_help("read symlink", src))?;
        let new_target = relocated_target(src, dst, top_src, &target);
        symlink(&new_target, dst).map_err(io_error_with_help("create symlink", dst))?;
        xattrs::copy(src, dst);
        debug!(src = %src.display(), dst = %dst.display(), target = %new_target.display(), "symlink recreated");
        Ok(new_target)
    }
}

/// Errors that mean "this filesystem will not hard link here", not "something broke".
fn link_unsupported(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(libc::EXDEV | libc::EPERM | libc::EMLINK | libc::EOPNOTSUPP)
    )
}

/// Target for a relocated symlink. Absolute targets are kept (they resolve via
/// the root). A relative target that stays inside the mapping's source tree is
/// rewritten relative to the link's own directory, which the destination
/// mirrors; one that leaves it is rewritten relative to the destination directory.
pub fn relocated_target(src: &Path, dst: &Path, top_src: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        return target.to_path_buf();
    }
    let (Some(src_dir), Some(dst_dir)) = (src.parent(), dst.parent()) else {
        return target.to_path_buf();
    };
    let lexical = normalize_lexically(&src_dir.join(target));
    if lexical.starts_with(top_src) {
        relative_path(&lexical, src_dir)
    } else {
        relative_path(&lexical, dst_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_target_is_kept() {
        let t = relocated_target(
            Path::new("/r/bin/sh"),
            Path::new("/r/usr/bin/sh"),
            Path::new("/r/bin"),
            Path::new("/bin/bash"),
        );
        assert_eq!(t, PathBuf::from("/bin/bash"));
    }

    #[test]
    fn target_inside_source_tree_keeps_shape() {
        let t = relocated_target(
            Path::new("/r/lib/firmware/a"),
            Path::new("/r/usr/lib/firmware/a"),
            Path::new("/r/lib"),
            Path::new("../b/./c"),
        );
        assert_eq!(t, PathBuf::from("../b/c"));
    }

    #[test]
    fn target_outside_source_tree_is_rebased_on_destination() {
        let t = relocated_target(
            Path::new("/r/sbin/foo"),
            Path::new("/r/usr/bin/foo"),
            Path::new("/r/sbin"),
            Path::new("../lib/x"),
        );
        assert_eq!(t, PathBuf::from("../../lib/x"));
    }

    #[test]
    fn self_reference_stays_dot() {
        let t = relocated_target(
            Path::new("/r/lib/X"),
            Path::new("/r/usr/lib/X"),
            Path::new("/r/lib"),
            Path::new("."),
        );
        assert_eq!(t, PathBuf::from("."));
    }
}
