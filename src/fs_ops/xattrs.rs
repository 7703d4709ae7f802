//! Extended attribute preservation.
//!
//! All functions operate on the entry itself and never follow a final symlink
//! (the `xattr` crate uses the l*xattr calls), so a symlink's own attributes
//! are captured and reapplied.
//!
//! Failures are logged and skipped, never returned: losing an attribute is less
//! severe than aborting the migration halfway. Without the "xattrs" feature
//! every function is a no-op.

use std::ffi::OsString;
use std::path::Path;

/// Attribute names and values captured from one filesystem entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XattrSet {
    entries: Vec<(OsString, Vec<u8>)>,
}

impl XattrSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read every extended attribute of `path`.
pub fn capture(path: &Path) -> XattrSet {
    #[cfg(feature = "xattrs")]
    {
        use tracing::warn;

        let mut set = XattrSet::default();
        let names = match xattr::list(path) {
            Ok(names) => names,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to list xattrs; continuing without them");
                return set;
            }
        };
        for name in names {
            match xattr::get(path, &name) {
                Ok(value) => set.entries.push((name, value.unwrap_or_default())),
                Err(e) => {
                    warn!(path = %path.display(), xattr = %name.to_string_lossy(), error = %e, "failed to read xattr value");
                }
            }
        }
        set
    }
    #[cfg(not(feature = "xattrs"))]
    {
        let _ = path;
        XattrSet::default()
    }
}

/// Write `set` onto `path`. Returns how many attributes could not be applied.
pub fn apply(path: &Path, set: &XattrSet) -> usize {
    #[cfg(feature = "xattrs")]
    {
        use tracing::{trace, warn};

        let mut failed = 0;
        for (name, value) in &set.entries {
            match xattr::set(path, name, value) {
                Ok(()) => {
                    trace!(path = %path.display(), xattr = %name.to_string_lossy(), size = value.len(), "preserved xattr");
                }
                Err(e) => {
                    warn!(path = %path.display(), xattr = %name.to_string_lossy(), error = %e, "failed to set xattr");
                    failed += 1;
                }
            }
        }
        failed
    }
    #[cfg(not(feature = "xattrs"))]
    {
        let _ = (path, set);
        0
    }
}

/// Copy all extended attributes from `src` to `dest`.
pub fn copy(src: &Path, dest: &Path) -> usize {
    let set = capture(src);
    if set.is_empty() {
        return 0;
    }
    apply(dest, &set)
}
