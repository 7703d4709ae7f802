//! Streaming copy used when a hard link is not possible.
//!
//! - Writes to a newly created destination file (O_EXCL semantics; never clobbers).
//! - The new file starts at mode 0600; callers restore the real mode afterwards
//!   so a half-written file is never visible with the source's permissions.
//! - `io::copy` between two files uses copy_file_range/sendfile on Linux.
//! - The destination is fsynced before returning.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Copy `src` -> `dst`, returning the number of bytes written.
/// Callers are responsible for syncing the parent directory after the final rename.
pub fn copy_streaming(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut src_f = File::open(src)?;
    let mut dst_f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(dst)?;

    let bytes = io::copy(&mut src_f, &mut dst_f)?;
    dst_f.flush()?;
    dst_f.sync_all()?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn copy_small_file_ok() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("src.txt");
        let dst_path = dir.path().join("dst.txt");
        let data = b"#!/bin/sh\necho hi\n";
        fs::write(&src_path, data).unwrap();

        let n = copy_streaming(&src_path, &dst_path).unwrap();
        assert_eq!(n, data.len() as u64);
        assert_eq!(fs::read(&dst_path).unwrap(), data);
    }

    #[test]
    fn copy_zero_length_ok() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("empty");
        let dst_path = dir.path().join("out");
        File::create(&src_path).unwrap();

        assert_eq!(copy_streaming(&src_path, &dst_path).unwrap(), 0);
        assert_eq!(fs::metadata(&dst_path).unwrap().len(), 0);
    }

    #[test]
    fn fails_if_dest_exists() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("src");
        let dst_path = dir.path().join("dst");
        fs::write(&src_path, b"data").unwrap();
        fs::write(&dst_path, b"x").unwrap();

        let err = copy_streaming(&src_path, &dst_path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dst_path).unwrap(), b"x");
    }
}
