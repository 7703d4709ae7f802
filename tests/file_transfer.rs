#![cfg(unix)]

use std::fs;
use std::os::unix::fs::{MetadataExt, symlink};
use std::path::PathBuf;
use tempfile::tempdir;

use usr_merge::merge::{FileTransfer, TransferMethod};

fn dirs() -> (tempfile::TempDir, PathBuf) {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::create_dir_all(root.join("usr/bin")).unwrap();
    (td, root)
}

#[test]
fn hard_link_leaves_symlink_behind() {
    let (_td, root) = dirs();
    let src = root.join("bin/ls");
    let dst = root.join("usr/bin/ls");
    fs::write(&src, b"ls").unwrap();
    let ino = fs::metadata(&src).unwrap().ino();

    let method = FileTransfer::with_force_copy(false).transfer_file(&src, &dst).unwrap();
    assert_eq!(method, TransferMethod::HardLink);
    assert_eq!(fs::metadata(&dst).unwrap().ino(), ino);
    assert_eq!(fs::read_link(&src).unwrap(), PathBuf::from("../usr/bin/ls"));
    assert_eq!(fs::read(&src).unwrap(), b"ls");
    assert_eq!(fs::read_dir(root.join("usr/bin")).unwrap().count(), 1);
    assert_eq!(fs::read_dir(root.join("bin")).unwrap().count(), 1);
}

#[test]
fn copy_produces_independent_inode() {
    let (_td, root) = dirs();
    let src = root.join("bin/cat");
    let dst = root.join("usr/bin/cat");
    fs::write(&src, b"cat").unwrap();

    let method = FileTransfer::with_force_copy(true).transfer_file(&src, &dst).unwrap();
    assert_eq!(method, TransferMethod::Copy);
    assert_eq!(fs::read(&dst).unwrap(), b"cat");
    assert_eq!(fs::symlink_metadata(&dst).unwrap().nlink(), 1);
    assert!(fs::symlink_metadata(&src).unwrap().file_type().is_symlink());
}

#[test]
fn stray_duplicate_becomes_symlink() {
    let (_td, root) = dirs();
    let dst = root.join("usr/bin/dup");
    let src = root.join("bin/dup");
    fs::write(&dst, b"same").unwrap();
    fs::hard_link(&dst, &src).unwrap();

    FileTransfer::with_force_copy(false).transfer_file(&src, &dst).unwrap();
    assert_eq!(fs::read(&dst).unwrap(), b"same");
    assert!(fs::symlink_metadata(&src).unwrap().file_type().is_symlink());
    // No staging entry survives the same-inode rename.
    assert_eq!(fs::read_dir(root.join("usr/bin")).unwrap().count(), 1);
}

#[test]
fn symlink_leaving_the_tree_is_rebased() {
    let (_td, root) = dirs();
    fs::create_dir_all(root.join("sbin")).unwrap();
    let src = root.join("sbin/tool");
    let dst = root.join("usr/bin/tool");
    symlink("../bin/tool", &src).unwrap();

    let target = FileTransfer::default()
        .transfer_symlink(&src, &dst, &root.join("sbin"))
        .unwrap();
    assert_eq!(target, PathBuf::from("../../bin/tool"));
    assert_eq!(fs::read_link(&dst).unwrap(), target);
    // The source link is left for the directory swap to remove.
    assert_eq!(fs::read_link(&src).unwrap(), PathBuf::from("../bin/tool"));
}

#[test]
fn symlink_onto_existing_name_fails() {
    let (_td, root) = dirs();
    let src = root.join("bin/sh");
    let dst = root.join("usr/bin/sh");
    symlink("bash", &src).unwrap();
    fs::write(&dst, b"occupied").unwrap();

    let err = FileTransfer::default()
        .transfer_symlink(&src, &dst, &root.join("bin"))
        .unwrap_err();
    assert!(format!("{err:#}").contains("create symlink"));
    assert_eq!(fs::read(&dst).unwrap(), b"occupied");
}
