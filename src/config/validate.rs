//! Config validation logic.
//! Verifies the root and merge base, canonicalizes the root, and rejects
//! mappings or patterns that could escape the tree or never match.

use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info};

use super::types::{Config, strip_root};
use crate::errors::UsrMergeError;
use crate::merge::IgnorePatterns;

/// Validate `cfg` and normalize it in place:
/// - root must be an existing directory; it is canonicalized
/// - prefix loses any leading `/` and may not contain `..`
/// - root/prefix must be an existing directory
/// - each mapping side must be a non-empty relative path without `..`, sides must differ
/// - every ignore pattern must compile
pub fn validate_and_normalize(cfg: &mut Config) -> Result<(), UsrMergeError> {
    if !cfg.root.is_dir() {
        error!(root = %cfg.root.display(), "root is not a directory");
        return Err(UsrMergeError::RootInvalid(cfg.root.clone()));
    }
    cfg.root = fs::canonicalize(&cfg.root).map_err(|_| UsrMergeError::RootInvalid(cfg.root.clone()))?;

    if let Some(prefix) = cfg.prefix.take() {
        let stripped = strip_root(&prefix);
        if has_parent_component(&stripped) {
            return Err(UsrMergeError::InvalidPrefix(prefix));
        }
        cfg.prefix = (!stripped.as_os_str().is_empty()).then_some(stripped);
    }

    let base = cfg.base();
    if !base.is_dir() {
        error!(base = %base.display(), "merge base is not a directory");
        return Err(UsrMergeError::BaseInvalid(base));
    }

    for m in &cfg.mappings {
        check_mapping_side(&m.legacy, &m.legacy, &m.canonical)?;
        check_mapping_side(&m.canonical, &m.legacy, &m.canonical)?;
        if m.legacy == m.canonical {
            return Err(invalid_mapping(&m.legacy, &m.canonical, "source and destination are the same"));
        }
        debug!(mapping = %m, "mapping accepted");
    }

    IgnorePatterns::new(&cfg.ignore_patterns)?;

    info!(
        root = %cfg.root.display(),
        base = %base.display(),
        mappings = cfg.mappings.len(),
        dry_run = cfg.dry_run,
        "Config validated"
    );
    Ok(())
}

fn has_parent_component(p: &Path) -> bool {
    p.components().any(|c| matches!(c, Component::ParentDir))
}

fn check_mapping_side(side: &Path, from: &Path, to: &Path) -> Result<(), UsrMergeError> {
    if side.as_os_str().is_empty() {
        return Err(invalid_mapping(from, to, "empty path"));
    }
    if side.is_absolute() {
        return Err(invalid_mapping(from, to, "path must be relative to the merge base"));
    }
    if has_parent_component(side) {
        return Err(invalid_mapping(from, to, "'..' is not allowed"));
    }
    Ok(())
}

fn invalid_mapping(from: &Path, to: &Path, reason: &str) -> UsrMergeError {
    UsrMergeError::InvalidMapping {
        from: PathBuf::from(from),
        to: PathBuf::from(to),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectoryMapping;
    use tempfile::tempdir;

    #[test]
    fn canonicalizes_root_and_strips_prefix_slash() {
        let td = tempdir().unwrap();
        fs::create_dir_all(td.path().join("sysroot")).unwrap();
        let mut cfg = Config::new(td.path());
        cfg.prefix = Some(PathBuf::from("/sysroot"));
        validate_and_normalize(&mut cfg).unwrap();
        assert_eq!(cfg.root, fs::canonicalize(td.path()).unwrap());
        assert_eq!(cfg.prefix, Some(PathBuf::from("sysroot")));
        assert!(cfg.base().ends_with("sysroot"));
    }

    #[test]
    fn rejects_missing_root() {
        let td = tempdir().unwrap();
        let mut cfg = Config::new(td.path().join("nope"));
        let err = validate_and_normalize(&mut cfg).unwrap_err();
        assert!(matches!(err, UsrMergeError::RootInvalid(_)));
    }

    #[test]
    fn rejects_escaping_mapping() {
        let td = tempdir().unwrap();
        let mut cfg = Config::new(td.path());
        cfg.mappings = vec![DirectoryMapping::new("bin", "../outside")];
        let err = validate_and_normalize(&mut cfg).unwrap_err();
        assert!(matches!(err, UsrMergeError::InvalidMapping { .. }));
    }

    #[test]
    fn rejects_prefix_with_parent() {
        let td = tempdir().unwrap();
        let mut cfg = Config::new(td.path());
        cfg.prefix = Some(PathBuf::from("a/../../b"));
        let err = validate_and_normalize(&mut cfg).unwrap_err();
        assert!(matches!(err, UsrMergeError::InvalidPrefix(_)));
    }

    #[test]
    fn rejects_bad_pattern() {
        let td = tempdir().unwrap();
        let mut cfg = Config::new(td.path());
        cfg.ignore_patterns = vec!["[".into()];
        let err = validate_and_normalize(&mut cfg).unwrap_err();
        assert!(matches!(err, UsrMergeError::InvalidPattern { .. }));
    }
}
