//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - DirectoryMapping is one legacy -> canonical pair of the mapping table.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use super::{DEFAULT_IGNORE_PATTERNS, DEFAULT_MAPPINGS};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// One entry of the directory mapping table, both sides relative to the merge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMapping {
    /// Legacy location, e.g. `bin`
    pub legacy: PathBuf,
    /// Canonical location under the unified prefix, e.g. `usr/bin`
    pub canonical: PathBuf,
}

impl DirectoryMapping {
    pub fn new(legacy: impl Into<PathBuf>, canonical: impl Into<PathBuf>) -> Self {
        Self {
            legacy: strip_root(&legacy.into()),
            canonical: strip_root(&canonical.into()),
        }
    }

    /// The built-in usr-merge table.
    pub fn defaults() -> Vec<Self> {
        DEFAULT_MAPPINGS
            .iter()
            .map(|(legacy, canonical)| Self::new(*legacy, *canonical))
            .collect()
    }
}

impl fmt::Display for DirectoryMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.legacy.display(), self.canonical.display())
    }
}

/// Drop a leading `/` so the path can be joined under a root.
pub(crate) fn strip_root(p: &Path) -> PathBuf {
    p.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

/// Runtime configuration used by the merge.
#[derive(Debug, Clone)]
pub struct Config {
    /// Filesystem root the migration operates on (absolute symlinks resolve here)
    pub root: PathBuf,
    /// Optional sub-path under root the mappings apply to
    pub prefix: Option<PathBuf>,
    /// legacy -> canonical pairs, processed in order
    pub mappings: Vec<DirectoryMapping>,
    /// Glob patterns matched against entry names; matches are skipped entirely
    pub ignore_patterns: Vec<String>,
    /// If true, validate and report but do not modify the filesystem
    pub dry_run: bool,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Skip the advisory run lock on the root directory
    pub disable_locks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            prefix: None,
            mappings: DirectoryMapping::defaults(),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            dry_run: false,
            log_level: LogLevel::Normal,
            log_file: None,
            disable_locks: false,
        }
    }
}

impl Config {
    /// Construct a Config rooted at `root`; other fields use defaults.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Directory the mapping table is applied under: root joined with prefix.
    pub fn base(&self) -> PathBuf {
        match &self.prefix {
            Some(prefix) => self.root.join(strip_root(prefix)),
            None => self.root.clone(),
        }
    }
}
