//! Walks the mapping table: merge each legacy directory, then promote it.
//!
//! Each mapping is independent. A failure in one never stops the next; the run
//! as a whole succeeds only if every mapping did.

use std::fmt;
use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{Config, DirectoryMapping};
use crate::errors::UsrMergeError;
use crate::fs_ops::helpers::io_error_with_help;
use crate::fs_ops::sweep_stale;

use super::entry::{ConflictRecord, EntryKind};
use super::ignore::IgnorePatterns;
use super::resolve::PathResolver;
use super::swap::AtomicSwapper;
use super::transfer::FileTransfer;
use super::tree::{DryRunPlan, MergeReport, MergeStats, NEW_DIR_MODE, TreeMerger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingStatus {
    /// Tree merged and the legacy directory replaced by a symlink.
    Merged,
    /// Dry-run: tree validated with no conflicts.
    Validated,
    /// Legacy path is already a symlink.
    AlreadyMerged,
    /// Legacy path does not exist.
    Missing,
    /// Legacy path exists but is not a directory; left alone.
    NotADirectory,
    /// Conflicts or errors; the legacy directory was left in place.
    Failed,
}

impl fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MappingStatus::Merged => "merged",
            MappingStatus::Validated => "validated",
            MappingStatus::AlreadyMerged => "already merged",
            MappingStatus::Missing => "missing",
            MappingStatus::NotADirectory => "not a directory",
            MappingStatus::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone)]
pub struct MappingOutcome {
    pub mapping: DirectoryMapping,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: MappingStatus,
    pub report: MergeReport,
}

impl MappingOutcome {
    pub fn success(&self) -> bool {
        self.status != MappingStatus::Failed
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<MappingOutcome>,
    pub dry_run: bool,
}

impl RunSummary {
    /// Logical AND over all mappings.
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(MappingOutcome::success)
    }

    pub fn conflict_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.report.conflicts.len()).sum()
    }

    pub fn totals(&self) -> MergeStats {
        let mut totals = MergeStats::default();
        for o in &self.outcomes {
            totals.add(&o.report.stats);
        }
        totals
    }

    pub fn count(&self, status: MappingStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// A validated migration ready to run.
#[derive(Debug, Clone)]
pub struct Migration {
    resolver: PathResolver,
    ignore: IgnorePatterns,
    base: PathBuf,
    mappings: Vec<DirectoryMapping>,
    dry_run: bool,
    transfer: FileTransfer,
    plan: DryRunPlan,
}

impl Migration {
    /// Build from a config that already went through `validate_and_normalize`.
    pub fn from_config(cfg: &Config) -> Result<Self, UsrMergeError> {
        Ok(Self {
            resolver: PathResolver::new(cfg.root.clone()),
            ignore: IgnorePatterns::new(&cfg.ignore_patterns)?,
            base: cfg.base(),
            mappings: cfg.mappings.clone(),
            dry_run: cfg.dry_run,
            transfer: FileTransfer::from_env(),
            plan: DryRunPlan::new(),
        })
    }

    pub fn with_transfer(mut self, transfer: FileTransfer) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn run(&self) -> RunSummary {
        self.plan.clear();
        let outcomes = self.mappings.iter().map(|m| self.run_mapping(m)).collect();
        RunSummary {
            outcomes,
            dry_run: self.dry_run,
        }
    }

    pub fn run_mapping(&self, mapping: &DirectoryMapping) -> MappingOutcome {
        let source = self.base.join(&mapping.legacy);
        let destination = self.base.join(&mapping.canonical);
        let mut report = MergeReport::default();
        let status = self.merge_mapping(&source, &destination, &mut report);

        match status {
            MappingStatus::Failed => {
                warn!(mapping = %mapping, conflicts = report.conflicts.len(), "mapping not merged; source left in place")
            }
            MappingStatus::Missing | MappingStatus::AlreadyMerged => {
                debug!(mapping = %mapping, %status, "nothing to do")
            }
            _ => info!(
                mapping = %mapping,
                %status,
                files = report.stats.files,
                symlinks = report.stats.symlinks,
                skipped = report.stats.skipped,
                "mapping done"
            ),
        }

        MappingOutcome {
            mapping: mapping.clone(),
            source,
            destination,
            status,
            report,
        }
    }

    fn merge_mapping(&self, src: &Path, dst: &Path, report: &mut MergeReport) -> MappingStatus {
        match fs::symlink_metadata(src) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return MappingStatus::Missing,
            Err(e) => {
                let reason = io_error_with_help("stat", src)(e).to_string();
                report.record(ConflictRecord::new(EntryKind::Directory, src, reason));
                return MappingStatus::Failed;
            }
            Ok(m) if m.file_type().is_symlink() => return MappingStatus::AlreadyMerged,
            Ok(m) if !m.is_dir() => {
                warn!(path = %src.display(), "legacy path is not a directory; skipping");
                return MappingStatus::NotADirectory;
            }
            Ok(_) => {}
        }

        let dst_real = match self.ensure_destination(dst) {
            Ok(real) => real,
            Err(reason) => {
                report.record(ConflictRecord::new(EntryKind::Directory, dst, reason));
                return MappingStatus::Failed;
            }
        };

        let src_real = self.resolver.canonicalize(src);
        if dst_real.starts_with(&src_real) {
            let reason = format!("destination {} lies inside the source directory", dst.display());
            report.record(ConflictRecord::new(EntryKind::Directory, src, reason));
            return MappingStatus::Failed;
        }

        self.sweep(src, &dst_real);

        let merged = TreeMerger::new(&self.resolver, &self.ignore, self.dry_run)
            .with_transfer(self.transfer.clone())
            .with_plan(&self.plan)
            .merge(src, &dst_real);
        report.absorb(merged);
        if !report.is_clean() {
            return MappingStatus::Failed;
        }
        if self.dry_run {
            return MappingStatus::Validated;
        }

        match AtomicSwapper::new().promote(src, dst) {
            Ok(_) => MappingStatus::Merged,
            Err(e) => {
                report.record(ConflictRecord::new(EntryKind::Directory, src, format!("{e:#}")));
                MappingStatus::Failed
            }
        }
    }

    /// Canonicalize the destination inside the root and create it (with
    /// parents) unless it exists. Nothing is created in dry-run. Returns the
    /// canonical path, which every later write goes through.
    fn ensure_destination(&self, dst: &Path) -> Result<PathBuf, String> {
        let real = self.resolver.canonicalize(dst);
        if !real.starts_with(self.resolver.root()) {
            return Err(format!("{} resolves outside the root ({})", dst.display(), real.display()));
        }
        match fs::symlink_metadata(&real) {
            Ok(m) if m.is_dir() => Ok(real),
            Ok(_) => Err(format!("{} exists and is not a directory", dst.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if fs::symlink_metadata(dst).is_ok_and(|m| m.file_type().is_symlink()) {
                    return Err(format!("{} is a dangling symlink inside the root", dst.display()));
                }
                if self.dry_run {
                    debug!(path = %real.display(), "dry-run: would create destination");
                    return Ok(real);
                }
                DirBuilder::new()
                    .recursive(true)
                    .mode(NEW_DIR_MODE)
                    .create(&real)
                    .map_err(|e| io_error_with_help("create destination", &real)(e).to_string())?;
                debug!(path = %real.display(), "created destination");
                Ok(real)
            }
            Err(e) => Err(io_error_with_help("stat destination", &real)(e).to_string()),
        }
    }

    /// Clear staging leftovers from an interrupted run before merging.
    fn sweep(&self, src: &Path, dst: &Path) {
        let mut found = sweep_stale(src, usize::MAX, self.dry_run);
        if fs::symlink_metadata(dst).is_ok_and(|m| m.is_dir()) {
            found += sweep_stale(dst, usize::MAX, self.dry_run);
        }
        if let Some(parent) = src.parent() {
            found += sweep_stale(parent, 1, self.dry_run);
        }
        if found > 0 {
            debug!(src = %src.display(), found, "stale staging entries handled");
        }
    }
}
