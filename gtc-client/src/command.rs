//! # Commands and Key Prefixing
//!
//! Purpose: Build store commands and apply a handle's key prefix to the first
//! argument of a fixed set of key-addressed commands.
//!
//! ## Design Principles
//! 1. **Closed Allow-List**: [`PREFIXED_COMMANDS`] is a constant; membership
//!    is a pure lookup.
//! 2. **Idempotent Rewrite**: A key that already starts with the prefix is
//!    left alone, so re-sending a command never double-prefixes.
//! 3. **Typed Arguments**: Only string arguments are keys; integers and raw
//!    bytes are never rewritten.

use bytes::BytesMut;

use crate::resp::{put_array_header, put_bulk, put_bulk_i64, put_bulk_u64};

/// Commands whose first argument names a key, hash or set and therefore
/// receives the handle's prefix.
pub const PREFIXED_COMMANDS: [&str; 26] = [
    "GET", "SET", "EXISTS", "DEL", "TYPE", "EXPIRE", "TTL",
    "RPUSH", "LPOP", "RPOP", "LLEN", "LRANGE",
    "SADD", "SREM", "SISMEMBER", "SMEMBERS", "SCARD",
    "HSET", "HMSET", "HGET", "HGETALL", "HLEN", "HEXISTS", "HVALS", "HKEYS", "HDEL",
];

/// Returns true when `name` (any case) is in [`PREFIXED_COMMANDS`].
pub fn is_prefix_eligible(name: &str) -> bool {
    PREFIXED_COMMANDS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(name))
}

/// One command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Str(String),
    Int(i64),
    UInt(u64),
    Bytes(Vec<u8>),
}

impl Arg {
    fn encode(&self, out: &mut BytesMut) {
        match self {
            Arg::Str(text) => put_bulk(out, text.as_bytes()),
            Arg::Int(value) => put_bulk_i64(out, *value),
            Arg::UInt(value) => put_bulk_u64(out, *value),
            Arg::Bytes(data) => put_bulk(out, data),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Str(value.clone())
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        Arg::UInt(value)
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::UInt(value.into())
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::UInt(value as u64)
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Bytes(value)
    }
}

/// A command name plus its arguments.
///
/// The name is uppercased on construction; the argument list is sent in
/// order after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Arg>,
}

impl Command {
    pub fn new(name: &str) -> Self {
        Command {
            name: name.to_ascii_uppercase(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends every argument from `args` in iteration order.
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Arg] {
        &self.args
    }

    pub fn is_prefix_eligible(&self) -> bool {
        is_prefix_eligible(&self.name)
    }

    /// Applies `prefix` to the first argument when the command is
    /// prefix-eligible and that argument is a non-empty string not already
    /// carrying the prefix.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        if prefix.is_empty() || !self.is_prefix_eligible() {
            return self;
        }
        if let Some(Arg::Str(key)) = self.args.first_mut() {
            if !key.is_empty() && !key.starts_with(prefix) {
                key.insert_str(0, prefix);
            }
        }
        self
    }

    /// Appends the RESP2 frame for this command.
    pub(crate) fn encode(&self, out: &mut BytesMut) {
        put_array_header(out, self.args.len() + 1);
        put_bulk(out, self.name.as_bytes());
        for arg in &self.args {
            arg.encode(out);
        }
    }
}

/// Flattens a key followed by values into one ordered argument list.
///
/// Value order is preserved; for list pushes it is the storage order.
pub fn key_with_values<K, I, V>(key: K, values: I) -> Vec<Arg>
where
    K: Into<Arg>,
    I: IntoIterator<Item = V>,
    V: Into<Arg>,
{
    let values = values.into_iter();
    let mut args = Vec::with_capacity(1 + values.size_hint().0);
    args.push(key.into());
    args.extend(values.map(Into::into));
    args
}
