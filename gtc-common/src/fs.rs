//! # Filesystem Helpers
//!
//! Purpose: Small predicates and copy helpers used by tooling around the
//! store client.
//!
//! ## Design Principles
//! 1. **Predicates Never Fail**: `path_exists`/`is_dir`/... fold any metadata
//!    error into `false`.
//! 2. **Fallible Mutations**: Directory creation and copies return
//!    `CommonResult` so callers see the underlying IO error.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use crate::error::{CommonError, CommonResult};

/// Returns true when something exists at `path`.
pub fn path_exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path).is_ok()
}

pub fn path_not_exists(path: impl AsRef<Path>) -> bool {
    !path_exists(path)
}

/// Returns true when `path` is a directory.
pub fn is_dir(path: impl AsRef<Path>) -> bool {
    fs::metadata(path).map(|meta| meta.is_dir()).unwrap_or(false)
}

/// Returns true when `path` exists and is not a directory (regular files,
/// devices, sockets, ...).
pub fn is_file(path: impl AsRef<Path>) -> bool {
    fs::metadata(path).map(|meta| !meta.is_dir()).unwrap_or(false)
}

/// Returns true when `path` is a regular file.
pub fn is_regular_file(path: impl AsRef<Path>) -> bool {
    fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false)
}

/// Creates a single directory level with mode 0755.
///
/// Succeeds without touching anything when the path already exists. Missing
/// parents are an error; see [`create_all_dir`].
pub fn create_dir(path: impl AsRef<Path>) -> CommonResult<()> {
    let path = path.as_ref();
    if path_exists(path) {
        return Ok(());
    }
    dir_builder(false).create(path)?;
    Ok(())
}

/// Creates a directory and all missing parents with mode 0755.
pub fn create_all_dir(path: impl AsRef<Path>) -> CommonResult<()> {
    dir_builder(true).create(path.as_ref())?;
    Ok(())
}

fn dir_builder(recursive: bool) -> fs::DirBuilder {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(recursive);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
}

/// Reads the whole file into memory.
pub fn read_bytes(path: impl AsRef<Path>) -> CommonResult<Vec<u8>> {
    Ok(fs::read(path)?)
}

/// Reads the whole file as UTF-8 text.
pub fn read_string(path: impl AsRef<Path>) -> CommonResult<String> {
    Ok(fs::read_to_string(path)?)
}

/// Copies `src` into `dst`, creating or truncating `dst`.
///
/// Returns the number of bytes written.
pub fn copy_file(dst: impl AsRef<Path>, src: impl AsRef<Path>) -> CommonResult<u64> {
    let (mut reader, mut writer) = open_copy_pair(dst.as_ref(), src.as_ref())?;
    Ok(io::copy(&mut reader, &mut writer)?)
}

/// Copies exactly `n` bytes from `src` into `dst`, creating or truncating `dst`.
///
/// A source shorter than `n` bytes is reported as `UnexpectedEof` after the
/// available bytes were written.
pub fn copy_file_n(dst: impl AsRef<Path>, src: impl AsRef<Path>, n: u64) -> CommonResult<u64> {
    let (reader, mut writer) = open_copy_pair(dst.as_ref(), src.as_ref())?;
    let written = io::copy(&mut reader.take(n), &mut writer)?;
    if written < n {
        return Err(CommonError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("copied {written} of {n} bytes"),
        )));
    }
    Ok(written)
}

fn open_copy_pair(dst: &Path, src: &Path) -> CommonResult<(File, File)> {
    if !is_file(src) {
        return Err(CommonError::SourceNotFile(src.to_path_buf()));
    }
    let reader = File::open(src)?;
    let writer = File::create(dst)?;
    Ok((reader, writer))
}
