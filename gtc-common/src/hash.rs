//! # Digest Helpers
//!
//! Purpose: Lowercase hex digests for strings and files, used for cache keys
//! and integrity checks.

use std::fs::File;
use std::io;
use std::path::Path;

use md5::{Digest, Md5};
use sha2::Sha256;

use crate::error::CommonResult;

/// MD5 of a UTF-8 string as 32 lowercase hex chars.
pub fn md5_hex(input: &str) -> String {
    to_hex(&Md5::digest(input.as_bytes()))
}

/// MD5 of a file's contents, streamed rather than loaded whole.
pub fn md5_file(path: impl AsRef<Path>) -> CommonResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(to_hex(&hasher.finalize()))
}

/// SHA-256 of raw bytes as 64 lowercase hex chars.
pub fn sha256_hex(input: &[u8]) -> String {
    to_hex(&Sha256::digest(input))
}

fn to_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0x0f) as usize] as char);
    }
    out
}
