//! Decide what to do with one source entry given what already sits at its destination.

use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use tracing::trace;

use super::resolve::PathResolver;

/// Outcome of checking one source entry against its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Destination is absent (or a stray duplicate of the source): go ahead.
    Proceed,
    /// Destination already holds the equivalent entry: nothing to do.
    Skip,
    /// Destination holds something else.
    Conflict(String),
}

#[derive(Debug, Clone, Copy)]
pub struct ConflictChecker<'a> {
    resolver: &'a PathResolver,
}

impl<'a> ConflictChecker<'a> {
    pub fn new(resolver: &'a PathResolver) -> Self {
        Self { resolver }
    }

    pub fn check(&self, src: &Path, dst: &Path, src_is_symlink: bool) -> Verdict {
        let dst_meta = match fs::symlink_metadata(dst) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Verdict::Proceed,
            Err(e) => return Verdict::Conflict(format!("cannot inspect destination: {e}")),
        };
        let dst_is_symlink = dst_meta.file_type().is_symlink();

        let src_res = if src_is_symlink {
            self.resolver.resolve(src)
        } else {
            src.to_path_buf()
        };
        let dst_res = if dst_is_symlink {
            self.resolver.resolve(dst)
        } else {
            dst.to_path_buf()
        };
        trace!(src = %src_res.display(), dst = %dst_res.display(), "comparing resolved entries");

        if src_res == dst_res || same_file(&src_res, &dst_res) {
            return if src_is_symlink {
                Verdict::Skip
            } else {
                Verdict::Proceed
            };
        }

        if src_is_symlink && dst_is_symlink && self.same_relative_target(src, dst, &src_res, &dst_res) {
            return Verdict::Skip;
        }

        Verdict::Conflict(format!("{} already exists", dst.display()))
    }

    /// Dry-run counterpart of `check` for a destination that does not exist
    /// yet but that `planned` (an entry of an earlier mapping) would fill.
    /// The same rules apply with `planned` standing in for the destination.
    pub fn check_planned(&self, src: &Path, src_is_symlink: bool, planned: &Path, planned_is_symlink: bool) -> Verdict {
        let src_res = if src_is_symlink {
            self.resolver.resolve(src)
        } else {
            src.to_path_buf()
        };
        let planned_res = if planned_is_symlink {
            self.resolver.resolve(planned)
        } else {
            planned.to_path_buf()
        };

        if src_res == planned_res || same_file(&src_res, &planned_res) {
            return if src_is_symlink {
                Verdict::Skip
            } else {
                Verdict::Proceed
            };
        }
        if src_is_symlink
            && planned_is_symlink
            && self.same_relative_target(src, planned, &src_res, &planned_res)
        {
            return Verdict::Skip;
        }
        Verdict::Conflict(format!("would collide with {}", planned.display()))
    }

    /// Both links use relative targets that land at the same place relative to
    /// their own directories, e.g. `lib/X -> .` and `usr/lib/X -> .`.
    fn same_relative_target(&self, src: &Path, dst: &Path, src_res: &Path, dst_res: &Path) -> bool {
        let relative = |p: &Path| fs::read_link(p).map(|t| t.is_relative()).unwrap_or(false);
        if !relative(src) || !relative(dst) {
            return false;
        }
        let (Some(src_dir), Some(dst_dir)) = (src.parent(), dst.parent()) else {
            return false;
        };
        let src_dir = self.resolver.canonicalize(src_dir);
        let dst_dir = self.resolver.canonicalize(dst_dir);
        match (src_res.strip_prefix(&src_dir), dst_res.strip_prefix(&dst_dir)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Same device and inode, following symlinks. Missing paths are never the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}
