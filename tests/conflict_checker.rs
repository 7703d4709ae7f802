#![cfg(unix)]

use std::fs;
use std::os::unix::fs::symlink;
use std::path::PathBuf;
use tempfile::tempdir;

use usr_merge::merge::{ConflictChecker, PathResolver, Verdict};

fn layout() -> (tempfile::TempDir, PathBuf) {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    for d in ["bin", "sbin", "lib", "usr/bin", "usr/lib"] {
        fs::create_dir_all(root.join(d)).unwrap();
    }
    (td, root)
}

#[test]
fn missing_destination_proceeds() {
    let (_td, root) = layout();
    fs::write(root.join("bin/ls"), b"ls").unwrap();
    let r = PathResolver::new(&root);
    let v = ConflictChecker::new(&r).check(&root.join("bin/ls"), &root.join("usr/bin/ls"), false);
    assert_eq!(v, Verdict::Proceed);
}

#[test]
fn relative_link_to_destination_is_skipped() {
    let (_td, root) = layout();
    fs::write(root.join("usr/bin/ls"), b"ls").unwrap();
    symlink("../usr/bin/ls", root.join("bin/ls")).unwrap();
    let r = PathResolver::new(&root);
    let v = ConflictChecker::new(&r).check(&root.join("bin/ls"), &root.join("usr/bin/ls"), true);
    assert_eq!(v, Verdict::Skip);
}

#[test]
fn absolute_link_resolved_within_root_is_skipped() {
    let (_td, root) = layout();
    fs::write(root.join("usr/bin/ls"), b"ls").unwrap();
    symlink("/usr/bin/ls", root.join("bin/ls")).unwrap();
    let r = PathResolver::new(&root);
    let v = ConflictChecker::new(&r).check(&root.join("bin/ls"), &root.join("usr/bin/ls"), true);
    assert_eq!(v, Verdict::Skip);
}

#[test]
fn self_referential_links_are_equivalent() {
    let (_td, root) = layout();
    symlink(".", root.join("lib/X")).unwrap();
    symlink(".", root.join("usr/lib/X")).unwrap();
    let r = PathResolver::new(&root);
    let v = ConflictChecker::new(&r).check(&root.join("lib/X"), &root.join("usr/lib/X"), true);
    assert_eq!(v, Verdict::Skip);
}

#[test]
fn distinct_regular_files_conflict() {
    let (_td, root) = layout();
    fs::write(root.join("sbin/foo"), b"one").unwrap();
    fs::write(root.join("usr/bin/foo"), b"two").unwrap();
    let r = PathResolver::new(&root);
    match ConflictChecker::new(&r).check(&root.join("sbin/foo"), &root.join("usr/bin/foo"), false) {
        Verdict::Conflict(reason) => assert!(reason.contains("already exists"), "{reason}"),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn hard_linked_duplicate_file_proceeds() {
    let (_td, root) = layout();
    fs::write(root.join("usr/bin/dup"), b"same").unwrap();
    fs::hard_link(root.join("usr/bin/dup"), root.join("bin/dup")).unwrap();
    let r = PathResolver::new(&root);
    let v = ConflictChecker::new(&r).check(&root.join("bin/dup"), &root.join("usr/bin/dup"), false);
    assert_eq!(v, Verdict::Proceed);
}

#[test]
fn symlink_pointing_elsewhere_conflicts() {
    let (_td, root) = layout();
    fs::write(root.join("usr/bin/awk"), b"gawk").unwrap();
    fs::write(root.join("usr/bin/mawk"), b"mawk").unwrap();
    symlink("../usr/bin/mawk", root.join("bin/awk")).unwrap();
    let r = PathResolver::new(&root);
    let v = ConflictChecker::new(&r).check(&root.join("bin/awk"), &root.join("usr/bin/awk"), true);
    assert!(matches!(v, Verdict::Conflict(_)), "{v:?}");
}

#[test]
fn links_with_equal_targets_are_skipped() {
    let (_td, root) = layout();
    fs::write(root.join("usr/bin/bash"), b"bash").unwrap();
    symlink("/usr/bin/bash", root.join("bin/sh")).unwrap();
    symlink("bash", root.join("usr/bin/sh")).unwrap();
    let r = PathResolver::new(&root);
    let v = ConflictChecker::new(&r).check(&root.join("bin/sh"), &root.join("usr/bin/sh"), true);
    assert_eq!(v, Verdict::Skip);
}
