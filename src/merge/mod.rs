//! The merge engine.
//!
//! Leaves first: `resolve` (symlinks inside the root), `check` (per-entry
//! verdict), `transfer` (move one entry), `tree` (recursive merge), `swap`
//! (directory to symlink) and `orchestrate` (the mapping table).

pub mod check;
pub mod entry;
pub mod ignore;
pub mod orchestrate;
pub mod resolve;
pub mod swap;
pub mod transfer;
pub mod tree;

pub use check::{ConflictChecker, Verdict};
pub use entry::{ConflictRecord, EntryKind};
pub use ignore::IgnorePatterns;
pub use orchestrate::{MappingOutcome, MappingStatus, Migration, RunSummary};
pub use resolve::{PathResolver, normalize_lexically, relative_path};
pub use swap::{AtomicSwapper, SwapMethod};
pub use transfer::{FORCE_COPY_ENV, FileTransfer, TransferMethod};
pub use tree::{DryRunPlan, MergeReport, MergeStats, TreeMerger};
