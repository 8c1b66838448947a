//! # RESP2 Encoding and Parsing
//!
//! Purpose: Frame requests and parse replies for the store's wire protocol
//! with buffers owned by the connection.
//!
//! ## Design Principles
//! 1. **Top-Down Parsing**: One reply is read per call; arrays recurse up to
//!    a fixed depth.
//! 2. **Buffer Reuse**: Callers pass the line buffer and the outgoing
//!    `BytesMut` so the hot path does not allocate per command.
//! 3. **Binary-Safe**: Bulk strings stay raw bytes until a typed decode.
//! 4. **Fail Fast**: Broken framing is a protocol error, never a guess.

use std::io::{BufRead, Read};

use bytes::{BufMut, BytesMut};

use crate::error::{StoreError, StoreResult};

/// Largest bulk string accepted, matching the server's `proto-max-bulk-len`.
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
/// Largest array element count accepted.
pub const MAX_ARRAY_LEN: i64 = 1024 * 1024 * 1024;
/// Deepest array nesting accepted.
pub const MAX_DEPTH: usize = 64;

// Upper bound on memory reserved before the payload actually arrives.
const MAX_PREALLOC: usize = 64 * 1024;

/// One server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Null bulk string (`$-1`) or null array (`*-1`).
    Nil,
    /// `+OK`, `+PONG`, `+QUEUED` style status lines.
    Status(String),
    /// `-ERR ...` replies.
    Error(String),
    /// `:123` replies.
    Integer(i64),
    /// `$n` bulk strings.
    Bulk(Vec<u8>),
    /// `*n` arrays.
    Array(Vec<Reply>),
}

/// Appends an array header (`*<len>\r\n`).
pub fn put_array_header(out: &mut BytesMut, len: usize) {
    out.put_u8(b'*');
    put_decimal(out, len as u64, false);
    out.put_slice(b"\r\n");
}

/// Appends one bulk string (`$<len>\r\n<data>\r\n`).
pub fn put_bulk(out: &mut BytesMut, data: &[u8]) {
    out.put_u8(b'$');
    put_decimal(out, data.len() as u64, false);
    out.put_slice(b"\r\n");
    out.put_slice(data);
    out.put_slice(b"\r\n");
}

/// Appends a signed integer as a bulk string.
pub fn put_bulk_i64(out: &mut BytesMut, value: i64) {
    let mut digits = BytesMut::with_capacity(20);
    put_decimal(&mut digits, value.unsigned_abs(), value < 0);
    put_bulk(out, &digits);
}

/// Appends an unsigned integer as a bulk string.
pub fn put_bulk_u64(out: &mut BytesMut, value: u64) {
    let mut digits = BytesMut::with_capacity(20);
    put_decimal(&mut digits, value, false);
    put_bulk(out, &digits);
}

fn put_decimal(out: &mut BytesMut, mut value: u64, negative: bool) {
    // Stack buffer: u64::MAX has 20 digits.
    let mut buf = [0u8; 20];
    let mut start = buf.len();
    loop {
        start -= 1;
        buf[start] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    if negative {
        out.put_u8(b'-');
    }
    out.put_slice(&buf[start..]);
}

/// Reads exactly one reply from the buffered reader.
///
/// Lengths announced by the server are bounded by [`MAX_BULK_LEN`] and
/// [`MAX_ARRAY_LEN`], and nesting by [`MAX_DEPTH`]; anything larger is a
/// protocol error.
pub fn read_reply<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> StoreResult<Reply> {
    read_reply_at(reader, line_buf, 0)
}

fn read_reply_at<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
    depth: usize,
) -> StoreResult<Reply> {
    read_line(reader, line_buf)?;
    let (&tag, body) = line_buf
        .split_first()
        .ok_or(StoreError::Protocol("empty reply line"))?;

    match tag {
        b'+' => Ok(Reply::Status(String::from_utf8_lossy(body).into_owned())),
        b'-' => Ok(Reply::Error(String::from_utf8_lossy(body).into_owned())),
        b':' => Ok(Reply::Integer(parse_i64(body)?)),
        b'$' => match parse_i64(body)? {
            len if len < 0 => Ok(Reply::Nil),
            len if len > MAX_BULK_LEN => Err(StoreError::Protocol("bulk string too large")),
            len => read_bulk(reader, len as usize),
        },
        b'*' => match parse_i64(body)? {
            len if len < 0 => Ok(Reply::Nil),
            len if len > MAX_ARRAY_LEN => Err(StoreError::Protocol("array too large")),
            _ if depth >= MAX_DEPTH => Err(StoreError::Protocol("reply nested too deeply")),
            len => {
                let len = len as usize;
                let mut items = Vec::with_capacity(len.min(MAX_PREALLOC));
                for _ in 0..len {
                    items.push(read_reply_at(reader, line_buf, depth + 1)?);
                }
                Ok(Reply::Array(items))
            }
        },
        _ => Err(StoreError::Protocol("unknown reply type")),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: usize) -> StoreResult<Reply> {
    // Payload plus trailing CRLF; the buffer grows only as bytes arrive.
    let framed = len + 2;
    let mut data = Vec::with_capacity(framed.min(MAX_PREALLOC));
    reader.by_ref().take(framed as u64).read_to_end(&mut data)?;
    if data.len() < framed {
        return Err(StoreError::Io(std::io::ErrorKind::UnexpectedEof.into()));
    }
    if !data.ends_with(b"\r\n") {
        return Err(StoreError::Protocol("bulk string missing CRLF"));
    }
    data.truncate(len);
    Ok(Reply::Bulk(data))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> StoreResult<()> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Err(StoreError::Protocol("connection closed"));
    }
    if !buf.ends_with(b"\r\n") {
        return Err(StoreError::Protocol("reply line missing CRLF"));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> StoreResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or(StoreError::Protocol("invalid integer"))
}
