//! Recursive merge of one source tree into its destination.
//!
//! The walk is depth-first and strictly sequential. Each entry is checked
//! before anything is touched; a conflict is recorded and the walk moves on
//! to the next sibling so one pass reports every problem under a mapping.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace};

use crate::errors::UsrMergeError;
use crate::fs_ops::helpers::io_error_with_help;
use crate::fs_ops::is_staging_name;

use super::check::{ConflictChecker, Verdict};
use super::entry::{ConflictRecord, EntryKind};
use super::ignore::IgnorePatterns;
use super::resolve::PathResolver;
use super::transfer::{FileTransfer, TransferMethod};

/// Mode for destination directories the merge creates.
pub const NEW_DIR_MODE: u32 = 0o755;

/// Counters for one merge. In dry-run they count what would have happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub files: usize,
    pub files_copied: usize,
    pub symlinks: usize,
    pub skipped: usize,
    pub directories_created: usize,
    pub ignored: usize,
}

impl MergeStats {
    pub(crate) fn add(&mut self, other: &MergeStats) {
        self.files += other.files;
        self.files_copied += other.files_copied;
        self.symlinks += other.symlinks;
        self.skipped += other.skipped;
        self.directories_created += other.directories_created;
        self.ignored += other.ignored;
    }
}

/// Result of merging one tree: every conflict found plus counters.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub conflicts: Vec<ConflictRecord>,
    pub stats: MergeStats,
}

impl MergeReport {
    /// True when nothing under the tree conflicted, so the source may be promoted.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn absorb(&mut self, other: MergeReport) {
        self.conflicts.extend(other.conflicts);
        self.stats.add(&other.stats);
    }

    pub(crate) fn record(&mut self, conflict: ConflictRecord) {
        error!(kind = %conflict.kind, path = %conflict.path.display(), reason = %conflict.reason, "conflict");
        self.conflicts.push(conflict);
    }
}

/// Destinations a dry run would already have filled, with the source entry
/// that would land there. Shared across mappings so a later mapping sees
/// what an earlier one would have moved in.
#[derive(Debug, Clone, Default)]
pub struct DryRunPlan {
    planned: RefCell<HashMap<PathBuf, (PathBuf, EntryKind)>>,
}

impl DryRunPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.planned.borrow_mut().clear();
    }

    fn lookup(&self, dst: &Path) -> Option<(PathBuf, EntryKind)> {
        self.planned.borrow().get(dst).cloned()
    }

    /// Returns false if `dst` was already planned.
    fn claim(&self, dst: &Path, src: &Path, kind: EntryKind) -> bool {
        let mut planned = self.planned.borrow_mut();
        if planned.contains_key(dst) {
            return false;
        }
        planned.insert(dst.to_path_buf(), (src.to_path_buf(), kind));
        true
    }
}

#[derive(Debug, Clone)]
pub struct TreeMerger<'a> {
    resolver: &'a PathResolver,
    ignore: &'a IgnorePatterns,
    transfer: FileTransfer,
    dry_run: bool,
    plan: Option<&'a DryRunPlan>,
}

impl<'a> TreeMerger<'a> {
    pub fn new(resolver: &'a PathResolver, ignore: &'a IgnorePatterns, dry_run: bool) -> Self {
        Self {
            resolver,
            ignore,
            transfer: FileTransfer::from_env(),
            dry_run,
            plan: None,
        }
    }

    pub fn with_transfer(mut self, transfer: FileTransfer) -> Self {
        self.transfer = transfer;
        self
    }

    /// Record dry-run placements in `plan` and check entries against it.
    /// Ignored outside dry-run.
    pub fn with_plan(mut self, plan: &'a DryRunPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    fn dry_plan(&self) -> Option<&'a DryRunPlan> {
        self.plan.filter(|_| self.dry_run)
    }

    /// Merge the contents of `src` into `dst`. `dst` must already exist unless
    /// this is a dry run.
    pub fn merge(&self, src: &Path, dst: &Path) -> MergeReport {
        self.merge_dir(src, dst, src)
    }

    fn merge_dir(&self, src_dir: &Path, dst_dir: &Path, top: &Path) -> MergeReport {
        let mut report = MergeReport::default();

        let mut entries = match fs::read_dir(src_dir).and_then(|rd| rd.collect::<io::Result<Vec<_>>>()) {
            Ok(entries) => entries,
            Err(e) => {
                let reason = io_error_with_help("read directory", src_dir)(e).to_string();
                report.record(ConflictRecord::new(EntryKind::Directory, src_dir, reason));
                return report;
            }
        };
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name();
            let src = entry.path();
            if is_staging_name(&name) {
                trace!(path = %src.display(), "skipping staging entry");
                continue;
            }
            if self.ignore.matches(&name) {
                debug!(path = %src.display(), "ignored");
                report.stats.ignored += 1;
                continue;
            }
            let dst = dst_dir.join(&name);

            let kind = match entry.file_type() {
                Ok(ft) => EntryKind::from_file_type(ft),
                Err(e) => {
                    let reason = io_error_with_help("stat", &src)(e).to_string();
                    report.record(ConflictRecord::new(EntryKind::Unsupported, &src, reason));
                    continue;
                }
            };

            match kind {
                EntryKind::Symlink | EntryKind::File => self.merge_leaf(kind, &src, &dst, top, &mut report),
                EntryKind::Directory => {
                    if let Some(dst) = self.prepare_dir(&src, &dst, &mut report) {
                        let child = self.merge_dir(&src, &dst, top);
                        report.absorb(child);
                    }
                }
                EntryKind::Unsupported => {
                    let reason = UsrMergeError::UnsupportedEntry(src.clone()).to_string();
                    report.record(ConflictRecord::new(kind, &src, reason));
                }
            }
        }
        report
    }

    fn merge_leaf(&self, kind: EntryKind, src: &Path, dst: &Path, top: &Path, report: &mut MergeReport) {
        let is_symlink = kind == EntryKind::Symlink;
        let checker = ConflictChecker::new(self.resolver);
        let planned = self
            .dry_plan()
            .filter(|_| fs::symlink_metadata(dst).is_err())
            .and_then(|plan| plan.lookup(dst));
        let verdict = match planned {
            Some((_, EntryKind::Directory)) => {
                Verdict::Conflict(format!("{} would already be a directory", dst.display()))
            }
            Some((other, other_kind)) => {
                checker.check_planned(src, is_symlink, &other, other_kind == EntryKind::Symlink)
            }
            None => checker.check(src, dst, is_symlink),
        };
        match verdict {
            Verdict::Skip => {
                debug!(path = %src.display(), "already merged");
                report.stats.skipped += 1;
            }
            Verdict::Conflict(reason) => report.record(ConflictRecord::new(kind, src, reason)),
            Verdict::Proceed if self.dry_run => {
                debug!(src = %src.display(), dst = %dst.display(), %kind, "dry-run: would merge");
                if let Some(plan) = self.dry_plan() {
                    plan.claim(dst, src, kind);
                }
                if is_symlink {
                    report.stats.symlinks += 1;
                } else {
                    report.stats.files += 1;
                }
            }
            Verdict::Proceed if is_symlink => match self.transfer.transfer_symlink(src, dst, top) {
                Ok(_) => report.stats.symlinks += 1,
                Err(e) => report.record(ConflictRecord::new(kind, src, format!("{e:#}"))),
            },
            Verdict::Proceed => match self.transfer.transfer_file(src, dst) {
                Ok(method) => {
                    report.stats.files += 1;
                    if method == TransferMethod::Copy {
                        report.stats.files_copied += 1;
                    }
                }
                Err(e) => report.record(ConflictRecord::new(kind, src, format!("{e:#}"))),
            },
        }
    }

    /// Make sure `dst` is a directory we can recurse into and return the path
    /// to recurse with. A destination symlink is followed inside the root, so
    /// the returned path never leaves it. Returns None after recording a conflict.
    fn prepare_dir(&self, src: &Path, dst: &Path, report: &mut MergeReport) -> Option<PathBuf> {
        let conflict = |report: &mut MergeReport, reason: String| -> Option<PathBuf> {
            report.record(ConflictRecord::new(EntryKind::Directory, src, reason));
            None
        };
        match fs::symlink_metadata(dst) {
            Ok(m) if m.is_dir() => Some(dst.to_path_buf()),
            Ok(m) if m.file_type().is_symlink() => match self.follow_dir_link(dst) {
                Ok(real) => Some(real),
                Err(reason) => conflict(report, reason),
            },
            Ok(_) => conflict(report, format!("{} exists and is not a directory", dst.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if self.dry_run {
                    let newly = match self.dry_plan() {
                        Some(plan) => match plan.lookup(dst) {
                            Some((other, kind)) if kind != EntryKind::Directory => {
                                let reason = format!("{} would already be filled from {}", dst.display(), other.display());
                                return conflict(report, reason);
                            }
                            Some(_) => false,
                            None => plan.claim(dst, src, EntryKind::Directory),
                        },
                        None => true,
                    };
                    if newly {
                        report.stats.directories_created += 1;
                        debug!(path = %dst.display(), "dry-run: would create directory");
                    }
                    return Some(dst.to_path_buf());
                }
                match DirBuilder::new().mode(NEW_DIR_MODE).create(dst) {
                    Ok(()) => {
                        report.stats.directories_created += 1;
                        debug!(path = %dst.display(), "created directory");
                        Some(dst.to_path_buf())
                    }
                    Err(e) => conflict(report, io_error_with_help("create directory", dst)(e).to_string()),
                }
            }
            Err(e) => conflict(report, io_error_with_help("stat destination", dst)(e).to_string()),
        }
    }

    /// Resolve a destination symlink inside the root. Ok only if it lands on
    /// an existing directory; a dangling link is still something in the way.
    fn follow_dir_link(&self, dst: &Path) -> Result<PathBuf, String> {
        let real = self.resolver.resolve(dst);
        if !real.starts_with(self.resolver.root()) {
            return Err(format!("{} points outside the root ({})", dst.display(), real.display()));
        }
        match fs::symlink_metadata(&real) {
            Ok(m) if m.is_dir() => {
                debug!(link = %dst.display(), real = %real.display(), "following destination symlink");
                Ok(real)
            }
            Ok(_) => Err(format!("{} points at {}, which is not a directory", dst.display(), real.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(format!("{} is a dangling symlink inside the root", dst.display()))
            }
            Err(e) => Err(io_error_with_help("stat destination", &real)(e).to_string()),
        }
    }
}
