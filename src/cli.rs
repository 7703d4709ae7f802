//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - --debug is a shorthand for --log-level debug; --verbose for --log-level info.
//! - --ignore appends to the configured ignore patterns.

use clap::{ArgAction, Parser, ValueHint};
use std::path::PathBuf;

use crate::config::types::{Config, LogLevel};

/// Merge legacy top-level directories into /usr.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone, Default)]
#[command(
    author,
    version,
    about = "Merge /bin, /sbin and /lib* into /usr and replace them with symlinks"
)]
pub struct Args {
    /// Root of the filesystem to migrate (absolute symlinks resolve under it).
    #[arg(long, value_hint = ValueHint::DirPath, help = "Filesystem root to operate on (default /)")]
    pub root: Option<PathBuf>,

    /// Sub-path under the root the mapping table applies to.
    #[arg(long, value_hint = ValueHint::DirPath, help = "Prefix under root to operate within")]
    pub prefix: Option<PathBuf>,

    /// Validate and report conflicts without touching the filesystem.
    #[arg(
        long,
        visible_alias = "dryrun",
        help = "Show what would be done, but do not modify files/directories"
    )]
    pub dry_run: bool,

    /// Raise log detail (equivalent to `--log-level info`).
    #[arg(short = 'v', long, help = "Verbose output (shorthand for --log-level info)")]
    pub verbose: bool,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Also write logs to this file (created 0600).
    #[arg(long, value_hint = ValueHint::FilePath, help = "Append logs to this file")]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Explicit config file (overrides USR_MERGE_CONFIG and the default location).
    #[arg(long, value_hint = ValueHint::FilePath, help = "Path to an XML config file")]
    pub config: Option<PathBuf>,

    /// Print where usr_merge will look for the config file, then exit.
    #[arg(long, help = "Print the config file location used by usr_merge and exit")]
    pub print_config: bool,

    /// Extra ignore pattern (glob on entry names). Repeatable.
    #[arg(long = "ignore", value_name = "PATTERN", action = ArgAction::Append)]
    pub ignore: Vec<String>,

    /// Skip the advisory lock on the root directory.
    #[arg(
        long,
        help = "Disable the run lock (for filesystems where flock is unsupported)"
    )]
    pub disable_locks: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > --verbose > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        if let Some(level) = self.log_level.as_deref().and_then(LogLevel::parse) {
            return Some(level);
        }
        self.verbose.then_some(LogLevel::Info)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(root) = &self.root {
            cfg.root = root.clone();
        }
        if let Some(prefix) = &self.prefix {
            cfg.prefix = Some(prefix.clone());
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(path) = &self.log_file {
            cfg.log_file = Some(path.clone());
        }
        cfg.ignore_patterns.extend(self.ignore.iter().cloned());
        if self.dry_run {
            cfg.dry_run = true;
        }
        if self.disable_locks {
            cfg.disable_locks = true;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
