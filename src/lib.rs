//! Core library for `usr_merge`.
//!
//! Merges legacy top-level directories (`/bin`, `/sbin`, `/lib*`) into their
//! canonical places under `/usr`, then replaces each legacy directory with a
//! relative symlink. The engine lives in [`merge`]; [`config`] loads and
//! validates settings; [`fs_ops`] holds the filesystem primitives.

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs_ops;
pub mod logging;
pub mod merge;
pub mod output;

pub use config::{
    CONFIG_ENV, Config, DirectoryMapping, LogLevel, default_config_path, path_has_symlink_ancestor,
    validate_and_normalize,
};
pub use errors::UsrMergeError;
pub use merge::{
    AtomicSwapper, ConflictChecker, ConflictRecord, EntryKind, FileTransfer, IgnorePatterns, MappingOutcome,
    MappingStatus, MergeReport, MergeStats, Migration, PathResolver, RunSummary, TreeMerger, Verdict,
};

/// Convenient imports for embedding the merge engine.
pub mod prelude {
    pub use crate::config::{Config, DirectoryMapping, LogLevel, validate_and_normalize};
    pub use crate::errors::UsrMergeError;
    pub use crate::merge::{
        ConflictRecord, EntryKind, MappingStatus, MergeReport, Migration, PathResolver, RunSummary, TreeMerger,
        Verdict,
    };
}
