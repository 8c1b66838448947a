//! # Prefixed Store
//!
//! Purpose: Expose a blocking, typed API over the key-value store that
//! namespaces keys with a per-handle prefix.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `PrefixedStore` hides pooling, framing and key
//!    prefixing behind one method per store command.
//! 2. **One Borrow per Call**: Each call takes a connection from the pool and
//!    returns it before the method returns, on success or error.
//! 3. **No Silent Coercion**: Reply shapes are checked by the typed decoders;
//!    a missing value is `None`, a failure is always `Err`.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::command::{key_with_values, Arg, Command};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::pool::ConnectionPool;
use crate::reply::KeyTtl;
use crate::resp::Reply;
use crate::transaction::TransactionBatch;

/// Status reply the store sends for a successful `SET`/`HMSET`.
pub const ACK_OK: &str = "OK";

const PONG: &str = "PONG";

/// Pooled store handle with automatic key prefixing.
///
/// Cloning is cheap and shares the pool; each clone carries its own prefix.
#[derive(Clone)]
pub struct PrefixedStore {
    pool: ConnectionPool,
    prefix: String,
}

impl PrefixedStore {
    /// Opens a store with default pool settings and no prefix.
    pub fn open(url: &str) -> StoreResult<Self> {
        Self::with_config(StoreConfig {
            url: url.to_string(),
            ..StoreConfig::default()
        })
    }

    /// Opens a store from a full configuration.
    ///
    /// No connection is made until the first command.
    pub fn with_config(config: StoreConfig) -> StoreResult<Self> {
        let pool = ConnectionPool::new(config.pool_config()?);
        debug!(
            addr = %pool.config().info.addr,
            max_idle = config.max_idle,
            max_active = config.max_active,
            "store configured"
        );
        Ok(PrefixedStore {
            pool,
            prefix: config.prefix,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Changes the prefix for subsequent calls. Batches already started keep
    /// the prefix they were created with.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Runs one command, prefixing its key when eligible, and returns the raw
    /// reply. Server error replies come back as [`StoreError::Server`].
    pub fn execute(&self, command: Command) -> StoreResult<Reply> {
        let command = command.with_prefix(&self.prefix);
        trace!(command = command.name(), "store execute");
        let mut conn = self.pool.acquire()?;
        conn.execute(&command)
    }

    /// Starts a `MULTI` block on a dedicated connection.
    ///
    /// The connection stays with the batch until [`TransactionBatch::commit`]
    /// or until the batch is dropped.
    pub fn begin_transaction(&self) -> StoreResult<TransactionBatch> {
        let mut conn = self.pool.acquire()?;
        conn.send(&Command::new("MULTI"))?;
        debug!(prefix = %self.prefix, "transaction started");
        Ok(TransactionBatch::new(conn, self.prefix.clone()))
    }

    // ---- keys ----

    /// Returns true when the server answers `PONG`.
    pub fn ping(&self) -> StoreResult<bool> {
        Ok(self.execute(Command::new("PING"))?.into_string()? == PONG)
    }

    /// Returns the store type name of a key ("string", "list", "none", ...).
    pub fn key_type(&self, key: &str) -> StoreResult<String> {
        self.execute(Command::new("TYPE").arg(key))?.into_string()
    }

    /// Lists keys matching `pattern`. The pattern is sent verbatim; include
    /// the prefix yourself to scope the search.
    pub fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.execute(Command::new("KEYS").arg(pattern))?.into_strings()
    }

    pub fn exists(&self, key: &str) -> StoreResult<bool> {
        self.execute(Command::new("EXISTS").arg(key))?.into_bool()
    }

    /// Deletes a key. Returns true when a key was removed.
    pub fn delete(&self, key: &str) -> StoreResult<bool> {
        self.execute(Command::new("DEL").arg(key))?.into_bool()
    }

    /// Sets a time-to-live in seconds. Returns true when the key exists.
    pub fn expire(&self, key: &str, seconds: u64) -> StoreResult<bool> {
        self.execute(Command::new("EXPIRE").arg(key).arg(seconds))?
            .into_bool()
    }

    pub fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        self.execute(Command::new("TTL").arg(key))?.into_ttl()
    }

    // ---- strings ----

    /// Fetches a value. Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.execute(Command::new("GET").arg(key))?.into_opt_string()
    }

    /// Stores a value. Any status other than `OK` is reported as
    /// [`StoreError::NotAcknowledged`].
    pub fn set(&self, key: &str, value: impl Into<Arg>) -> StoreResult<()> {
        let reply = self.execute(Command::new("SET").arg(key).arg(value))?;
        expect_ack("SET", reply)
    }

    // ---- lists ----

    /// Appends values to the tail of a list in the given order. Returns the
    /// list length after the push.
    pub fn rpush<I, V>(&self, key: &str, values: I) -> StoreResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Arg>,
    {
        self.execute(Command::new("RPUSH").args(key_with_values(key, values)))?
            .into_u64()
    }

    /// Removes and returns the head of a list, `None` when empty.
    pub fn lpop(&self, key: &str) -> StoreResult<Option<String>> {
        self.execute(Command::new("LPOP").arg(key))?.into_opt_string()
    }

    /// Removes and returns the tail of a list, `None` when empty.
    pub fn rpop(&self, key: &str) -> StoreResult<Option<String>> {
        self.execute(Command::new("RPOP").arg(key))?.into_opt_string()
    }

    pub fn llen(&self, key: &str) -> StoreResult<u64> {
        self.execute(Command::new("LLEN").arg(key))?.into_u64()
    }

    /// Returns elements between `start` and `stop` inclusive; negative
    /// offsets count from the tail.
    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        self.execute(Command::new("LRANGE").arg(key).arg(start).arg(stop))?
            .into_strings()
    }

    // ---- sets ----

    /// Adds members, ignoring ones already present. Returns how many were new.
    pub fn sadd<I, V>(&self, key: &str, members: I) -> StoreResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Arg>,
    {
        self.execute(Command::new("SADD").args(key_with_values(key, members)))?
            .into_u64()
    }

    /// Removes members, ignoring missing ones. Returns how many were removed.
    pub fn srem<I, V>(&self, key: &str, members: I) -> StoreResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Arg>,
    {
        self.execute(Command::new("SREM").args(key_with_values(key, members)))?
            .into_u64()
    }

    pub fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.execute(Command::new("SISMEMBER").arg(key).arg(member))?
            .into_bool()
    }

    pub fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.execute(Command::new("SMEMBERS").arg(key))?.into_strings()
    }

    pub fn scard(&self, key: &str) -> StoreResult<u64> {
        self.execute(Command::new("SCARD").arg(key))?.into_u64()
    }

    // ---- hashes ----

    /// Sets one field. Returns 1 when the field is new, 0 when overwritten.
    pub fn hset(&self, name: &str, field: &str, value: impl Into<Arg>) -> StoreResult<u64> {
        self.execute(Command::new("HSET").arg(name).arg(field).arg(value))?
            .into_u64()
    }

    /// Sets several fields at once. Acknowledged like [`set`](Self::set).
    pub fn hmset<I, F, V>(&self, name: &str, fields: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Arg>,
        V: Into<Arg>,
    {
        let reply = self.execute(hmset_command(name, fields))?;
        expect_ack("HMSET", reply)
    }

    /// Returns a field value, `None` when the field or hash is missing.
    pub fn hget(&self, name: &str, field: &str) -> StoreResult<Option<String>> {
        self.execute(Command::new("HGET").arg(name).arg(field))?
            .into_opt_string()
    }

    pub fn hgetall(&self, name: &str) -> StoreResult<HashMap<String, String>> {
        self.execute(Command::new("HGETALL").arg(name))?.into_string_map()
    }

    pub fn hlen(&self, name: &str) -> StoreResult<u64> {
        self.execute(Command::new("HLEN").arg(name))?.into_u64()
    }

    pub fn hexists(&self, name: &str, field: &str) -> StoreResult<bool> {
        self.execute(Command::new("HEXISTS").arg(name).arg(field))?
            .into_bool()
    }

    pub fn hvals(&self, name: &str) -> StoreResult<Vec<String>> {
        self.execute(Command::new("HVALS").arg(name))?.into_strings()
    }

    pub fn hkeys(&self, name: &str) -> StoreResult<Vec<String>> {
        self.execute(Command::new("HKEYS").arg(name))?.into_strings()
    }

    /// Deletes fields. Returns how many existed.
    pub fn hdel<I, V>(&self, name: &str, fields: I) -> StoreResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Arg>,
    {
        self.execute(Command::new("HDEL").args(key_with_values(name, fields)))?
            .into_u64()
    }
}

/// Builds `HMSET name f1 v1 f2 v2 ...` preserving iteration order.
pub(crate) fn hmset_command<I, F, V>(name: &str, fields: I) -> Command
where
    I: IntoIterator<Item = (F, V)>,
    F: Into<Arg>,
    V: Into<Arg>,
{
    fields
        .into_iter()
        .fold(Command::new("HMSET").arg(name), |command, (field, value)| {
            command.arg(field).arg(value)
        })
}

fn expect_ack(command: &str, reply: Reply) -> StoreResult<()> {
    let status = reply.into_string()?;
    if status == ACK_OK {
        Ok(())
    } else {
        Err(StoreError::NotAcknowledged {
            command: command.to_string(),
            status,
        })
    }
}
