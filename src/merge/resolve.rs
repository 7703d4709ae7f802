//! Symlink resolution confined to the migration root.
//!
//! The tree being merged may be an offline system image, so an absolute link
//! target such as `/lib/foo` must mean `<root>/lib/foo`, never the host's
//! `/lib/foo`. Canonicalization therefore walks the path one component at a
//! time, re-rooting every absolute target it meets along the way. `..` at the
//! root stays at the root, the same way the kernel treats `/..`.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::trace;

/// Same limit as Linux MAXSYMLINKS.
const MAX_LINK_HOPS: usize = 40;

#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// `root` should already be canonical (see `validate_and_normalize`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the symlink at `path` to a canonical path inside the root.
    /// If `path` cannot be read as a link it is returned unchanged.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let target = match fs::read_link(path) {
            Ok(t) => t,
            Err(_) => return path.to_path_buf(),
        };
        let joined = if target.is_absolute() {
            self.reroot(&target)
        } else {
            path.parent().unwrap_or(&self.root).join(&target)
        };
        let resolved = self.canonicalize(&joined);
        trace!(link = %path.display(), target = %target.display(), resolved = %resolved.display(), "resolved symlink");
        resolved
    }

    /// Interpret an absolute path as seen from inside the root.
    pub fn reroot(&self, abs: &Path) -> PathBuf {
        self.root.join(strip_leading_root(abs))
    }

    /// Canonicalize `path` (which must lie under the root) following every
    /// symlink inside the root. Components that do not exist are kept
    /// lexically, so a dangling link still yields a usable path.
    /// Paths outside the root fall back to the host's canonicalize.
    pub fn canonicalize(&self, path: &Path) -> PathBuf {
        let rest = match path.strip_prefix(&self.root) {
            Ok(rest) => rest,
            Err(_) => return fs::canonicalize(path).unwrap_or_else(|_| normalize_lexically(path)),
        };

        let mut pending: VecDeque<OsString> = components_of(rest).collect();
        let mut out = self.root.clone();
        let mut hops = 0usize;

        while let Some(comp) = pending.pop_front() {
            if comp == "." {
                continue;
            }
            if comp == ".." {
                if out != self.root {
                    out.pop();
                }
                continue;
            }

            let candidate = out.join(&comp);
            let is_link = fs::symlink_metadata(&candidate)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            if !is_link {
                out = candidate;
                continue;
            }

            hops += 1;
            let target = match fs::read_link(&candidate) {
                Ok(t) if hops <= MAX_LINK_HOPS => t,
                // Unreadable link or a loop: stop here and keep the rest lexical.
                _ => {
                    out = candidate;
                    for c in pending.drain(..) {
                        out.push(c);
                    }
                    return normalize_lexically(&out);
                }
            };
            if target.is_absolute() {
                out = self.root.clone();
            }
            for c in components_of(&target).collect::<Vec<_>>().into_iter().rev() {
                pending.push_front(c);
            }
        }
        out
    }
}

fn components_of(p: &Path) -> impl Iterator<Item = OsString> + '_ {
    p.components().filter_map(|c| match c {
        Component::Normal(s) => Some(s.to_os_string()),
        Component::ParentDir => Some(OsString::from("..")),
        Component::CurDir => Some(OsString::from(".")),
        Component::RootDir | Component::Prefix(_) => None,
    })
}

fn strip_leading_root(p: &Path) -> PathBuf {
    p.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn normalize_lexically(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in p.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    Some(Component::RootDir) => true,
                    _ => false,
                };
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Relative path that leads from directory `base` to `target`.
/// Both should be absolute and normalized. Equal paths give `.`.
pub fn relative_path(target: &Path, base: &Path) -> PathBuf {
    let t: Vec<_> = target.components().collect();
    let b: Vec<_> = base.components().collect();
    let common = t.iter().zip(&b).take_while(|(x, y)| x == y).count();

    let mut out = PathBuf::new();
    for _ in common..b.len() {
        out.push("..");
    }
    for c in &t[common..] {
        out.push(c.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_cases() {
        assert_eq!(relative_path(Path::new("/r/usr/bin"), Path::new("/r")), PathBuf::from("usr/bin"));
        assert_eq!(relative_path(Path::new("/r/usr/bin"), Path::new("/r/usr")), PathBuf::from("bin"));
        assert_eq!(
            relative_path(Path::new("/r/usr/bin/ls"), Path::new("/r/bin")),
            PathBuf::from("../usr/bin/ls")
        );
        assert_eq!(relative_path(Path::new("/r/lib"), Path::new("/r/lib")), PathBuf::from("."));
        assert_eq!(relative_path(Path::new("/r"), Path::new("/r/a/b")), PathBuf::from("../.."));
    }

    #[test]
    fn normalize_handles_dots() {
        assert_eq!(normalize_lexically(Path::new("/r/lib/../usr/./lib")), PathBuf::from("/r/usr/lib"));
        assert_eq!(normalize_lexically(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize_lexically(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn non_link_is_returned_unchanged() {
        let r = PathResolver::new("/nonexistent-root");
        let p = Path::new("/nonexistent-root/bin/ls");
        assert_eq!(r.resolve(p), p);
    }

    #[test]
    fn reroot_joins_under_root() {
        let r = PathResolver::new("/srv/image");
        assert_eq!(r.reroot(Path::new("/lib/foo")), PathBuf::from("/srv/image/lib/foo"));
    }
}
