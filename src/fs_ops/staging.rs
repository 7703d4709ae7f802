//! Staging names for temp-then-rename sequences.
//!
//! Every intermediate entry the merge creates lives next to its final location
//! under a name `.usr-merge.<uuid>.tmp`. The uuid is random (v4) and callers
//! create the entry with exclusive semantics (link/symlink/create_new all fail
//! with EEXIST), retrying with a fresh name on collision.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

pub const STAGING_PREFIX: &str = ".usr-merge.";
pub const STAGING_SUFFIX: &str = ".tmp";

const MAX_ATTEMPTS: usize = 8;

/// A fresh, not-yet-created staging path inside `dir`.
pub fn staging_path(dir: &Path) -> PathBuf {
    let id = Uuid::new_v4().simple();
    dir.join(format!("{STAGING_PREFIX}{id}{STAGING_SUFFIX}"))
}

/// True if `name` looks like one of our staging entries.
pub fn is_staging_name(name: &OsStr) -> bool {
    let Some(s) = name.to_str() else {
        return false;
    };
    s.len() > STAGING_PREFIX.len() + STAGING_SUFFIX.len()
        && s.starts_with(STAGING_PREFIX)
        && s.ends_with(STAGING_SUFFIX)
}

/// Run `create` against fresh staging paths in `dir` until it does not fail with
/// AlreadyExists. Returns the path that was created.
pub fn create_staged<F>(dir: &Path, mut create: F) -> io::Result<PathBuf>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut last = None;
    for _ in 0..MAX_ATTEMPTS {
        let candidate = staging_path(dir);
        match create(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "staging name collision; retrying");
                last = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last.unwrap_or_else(|| io::Error::from(io::ErrorKind::AlreadyExists)))
}

/// Detect a cross-filesystem failure (EXDEV).
pub fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

/// fsync a directory so a rename inside it is durable.
pub fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Remove staging entries left behind by an interrupted run.
/// `max_depth` limits the walk (1 = direct children only). Symlinks are not followed.
/// In dry-run the entries are only reported. Returns how many were found.
pub fn sweep_stale(dir: &Path, max_depth: usize, dry_run: bool) -> usize {
    let mut stale = Vec::new();
    let mut it = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter();
    while let Some(entry) = it.next() {
        let Ok(entry) = entry else {
            continue;
        };
        if is_staging_name(entry.file_name()) {
            if entry.file_type().is_dir() {
                it.skip_current_dir();
            }
            stale.push(entry.into_path());
        }
    }

    for path in &stale {
        if dry_run {
            warn!(path = %path.display(), "dry-run: stale staging entry would be removed");
            continue;
        }
        let res = match fs::symlink_metadata(path) {
            Ok(m) if m.file_type().is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };
        match res {
            Ok(()) => warn!(path = %path.display(), "removed stale staging entry from an interrupted run"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale staging entry"),
        }
    }
    stale.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[test]
    fn staging_names_are_recognised_and_unique() {
        let dir = Path::new("/x");
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let p = staging_path(dir);
            assert!(is_staging_name(p.file_name().unwrap()));
            assert!(seen.insert(p));
        }
        assert!(!is_staging_name(OsStr::new(".usr-merge..tmp")));
        assert!(!is_staging_name(OsStr::new("ls")));
    }

    #[test]
    fn create_staged_retries_on_collision() {
        let td = tempdir().unwrap();
        let mut calls = 0;
        let created = create_staged(td.path(), |p| {
            calls += 1;
            if calls < 3 {
                return Err(io::Error::from(io::ErrorKind::AlreadyExists));
            }
            fs::write(p, b"x")
        })
        .unwrap();
        assert_eq!(calls, 3);
        assert!(created.exists());
    }

    #[test]
    fn sweep_removes_only_staging_entries() {
        let td = tempdir().unwrap();
        let keep = td.path().join("ls");
        fs::write(&keep, b"bin").unwrap();
        let nested = td.path().join("sub");
        fs::create_dir(&nested).unwrap();
        let stale_file = staging_path(&nested);
        fs::write(&stale_file, b"half").unwrap();
        let stale_dir = staging_path(td.path());
        fs::create_dir(&stale_dir).unwrap();
        fs::write(stale_dir.join("inner"), b"x").unwrap();

        assert_eq!(sweep_stale(td.path(), usize::MAX, true), 2);
        assert!(stale_file.exists());

        assert_eq!(sweep_stale(td.path(), usize::MAX, false), 2);
        assert!(!stale_file.exists());
        assert!(!stale_dir.exists());
        assert!(keep.exists());
    }
}
