//! Typed decoding of [`Reply`] values.
//!
//! Each decoder accepts only the reply shapes the store actually produces for
//! that result type; anything else is a [`StoreError::Decode`], never a
//! silently coerced default.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::resp::Reply;

/// TTL state of a key, mirroring the store's `TTL` sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key is missing or already expired (`-2`).
    Missing,
    /// Key exists without expiration (`-1`).
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

impl Reply {
    /// Short name of the reply shape, used in decode errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Nil => "nil",
            Reply::Status(_) => "status",
            Reply::Error(_) => "error",
            Reply::Integer(_) => "integer",
            Reply::Bulk(_) => "bulk",
            Reply::Array(_) => "array",
        }
    }

    fn mismatch<T>(&self, expected: &'static str) -> StoreResult<T> {
        Err(StoreError::Decode {
            expected,
            found: self.kind(),
        })
    }

    /// Decodes a status or UTF-8 bulk string.
    pub fn into_string(self) -> StoreResult<String> {
        match self {
            Reply::Status(text) => Ok(text),
            Reply::Bulk(data) => String::from_utf8(data).map_err(|_| StoreError::Decode {
                expected: "string",
                found: "non-utf8 bulk",
            }),
            other => other.mismatch("string"),
        }
    }

    /// Like [`into_string`](Self::into_string) but maps `Nil` to `None`.
    pub fn into_opt_string(self) -> StoreResult<Option<String>> {
        match self {
            Reply::Nil => Ok(None),
            other => other.into_string().map(Some),
        }
    }

    /// Decodes an integer reply.
    pub fn into_i64(self) -> StoreResult<i64> {
        match self {
            Reply::Integer(value) => Ok(value),
            other => other.mismatch("integer"),
        }
    }

    /// Decodes a non-negative integer reply.
    pub fn into_u64(self) -> StoreResult<u64> {
        match self {
            Reply::Integer(value) if value >= 0 => Ok(value as u64),
            Reply::Integer(_) => Err(StoreError::Decode {
                expected: "unsigned integer",
                found: "negative integer",
            }),
            other => other.mismatch("unsigned integer"),
        }
    }

    /// Decodes an integer reply as a flag (non-zero is true).
    pub fn into_bool(self) -> StoreResult<bool> {
        match self {
            Reply::Integer(value) => Ok(value != 0),
            other => other.mismatch("boolean"),
        }
    }

    /// Decodes an array of strings, preserving order.
    pub fn into_strings(self) -> StoreResult<Vec<String>> {
        match self {
            Reply::Array(items) => items.into_iter().map(Reply::into_string).collect(),
            other => other.mismatch("string array"),
        }
    }

    /// Decodes a flat `[k1, v1, k2, v2, ...]` array into a map.
    pub fn into_string_map(self) -> StoreResult<HashMap<String, String>> {
        let items = match self {
            Reply::Array(items) if items.len() % 2 == 0 => items,
            Reply::Array(_) => {
                return Err(StoreError::Decode {
                    expected: "string map",
                    found: "odd-length array",
                })
            }
            other => return other.mismatch("string map"),
        };

        let mut map = HashMap::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            map.insert(key.into_string()?, value.into_string()?);
        }
        Ok(map)
    }

    /// Decodes an array into its opaque elements.
    pub fn into_values(self) -> StoreResult<Vec<Reply>> {
        match self {
            Reply::Array(items) => Ok(items),
            other => other.mismatch("array"),
        }
    }

    /// Decodes a `TTL` reply.
    pub fn into_ttl(self) -> StoreResult<KeyTtl> {
        match self.into_i64()? {
            -2 => Ok(KeyTtl::Missing),
            -1 => Ok(KeyTtl::NoExpiry),
            secs if secs >= 0 => Ok(KeyTtl::ExpiresIn(Duration::from_secs(secs as u64))),
            _ => Err(StoreError::Decode {
                expected: "ttl",
                found: "negative integer",
            }),
        }
    }
}
