//! Filesystem entry classification and conflict records.

use std::fmt;
use std::fs::FileType;
use std::io;
use std::path::{Path, PathBuf};

/// What kind of object sits at a path, without following a final symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Symlink,
    Directory,
    /// Device nodes, sockets, FIFOs: never merged.
    Unsupported,
}

impl EntryKind {
    pub fn from_file_type(ft: FileType) -> Self {
        if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Directory
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Unsupported
        }
    }

    /// Classify `path` via lstat.
    pub fn of(path: &Path) -> io::Result<Self> {
        Ok(Self::from_file_type(std::fs::symlink_metadata(path)?.file_type()))
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryKind::File => "file",
            EntryKind::Symlink => "symlink",
            EntryKind::Directory => "directory",
            EntryKind::Unsupported => "special file",
        })
    }
}

/// One entry that could not be merged. Any record under a mapping keeps its
/// source directory from being replaced by a symlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub kind: EntryKind,
    pub path: PathBuf,
    pub reason: String,
}

impl ConflictRecord {
    pub fn new(kind: EntryKind, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.path.display(), self.reason)
    }
}
