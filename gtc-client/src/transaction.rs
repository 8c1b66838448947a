//! # Transaction Batch
//!
//! Purpose: Queue prefixed commands inside a `MULTI` block on one held
//! connection and submit them with a single `EXEC`.
//!
//! ## Design Principles
//! 1. **Single Use**: The batch is `Active` until the first `commit`, then
//!    `Closed` for good, whatever the outcome of that commit.
//! 2. **Prefix Snapshot**: The prefix is copied from the store when the batch
//!    starts; later store changes do not reach it.
//! 3. **Store-Side Atomicity**: All-or-nothing application is the store's
//!    `MULTI`/`EXEC` guarantee; the batch only sequences the protocol.

use tracing::debug;

use crate::command::{key_with_values, Arg, Command};
use crate::error::{StoreError, StoreResult};
use crate::pool::PooledConnection;
use crate::resp::Reply;
use crate::store::hmset_command;

enum BatchState {
    Active(PooledConnection),
    Closed,
}

/// In-flight `MULTI` block created by
/// [`PrefixedStore::begin_transaction`](crate::PrefixedStore::begin_transaction).
///
/// Buffering calls only write into the connection's output buffer; nothing
/// reaches the server until [`commit`](Self::commit). Dropping an uncommitted
/// batch closes its connection, which makes the server discard the block.
pub struct TransactionBatch {
    prefix: String,
    state: BatchState,
    queued: usize,
}

impl TransactionBatch {
    pub(crate) fn new(conn: PooledConnection, prefix: String) -> Self {
        TransactionBatch {
            prefix,
            state: BatchState::Active(conn),
            queued: 0,
        }
    }

    /// Prefix captured when the batch started.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of commands buffered so far.
    pub fn queued(&self) -> usize {
        self.queued
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, BatchState::Closed)
    }

    /// Buffers one command, prefixing its key when eligible.
    pub fn send(&mut self, command: Command) -> StoreResult<()> {
        let conn = match &mut self.state {
            BatchState::Active(conn) => conn,
            BatchState::Closed => return Err(StoreError::BatchClosed),
        };
        let command = command.with_prefix(&self.prefix);
        conn.send(&command)?;
        self.queued += 1;
        Ok(())
    }

    /// Sends `EXEC` and returns one reply per buffered command, in order.
    ///
    /// The batch is closed before anything is sent, so a failed commit cannot
    /// be retried on the same batch. The connection goes back to the pool (or
    /// is closed when broken) before this returns.
    pub fn commit(&mut self) -> StoreResult<Vec<Reply>> {
        let mut conn = match std::mem::replace(&mut self.state, BatchState::Closed) {
            BatchState::Active(conn) => conn,
            BatchState::Closed => return Err(StoreError::BatchClosed),
        };
        debug!(queued = self.queued, "committing transaction");
        conn.execute(&Command::new("EXEC"))?.into_values()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Arg>) -> StoreResult<()> {
        self.send(Command::new("SET").arg(key).arg(value))
    }

    pub fn delete(&mut self, key: &str) -> StoreResult<()> {
        self.send(Command::new("DEL").arg(key))
    }

    pub fn expire(&mut self, key: &str, seconds: u64) -> StoreResult<()> {
        self.send(Command::new("EXPIRE").arg(key).arg(seconds))
    }

    pub fn rpush<I, V>(&mut self, key: &str, values: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Arg>,
    {
        self.send(Command::new("RPUSH").args(key_with_values(key, values)))
    }

    pub fn lpop(&mut self, key: &str) -> StoreResult<()> {
        self.send(Command::new("LPOP").arg(key))
    }

    pub fn rpop(&mut self, key: &str) -> StoreResult<()> {
        self.send(Command::new("RPOP").arg(key))
    }

    pub fn sadd<I, V>(&mut self, key: &str, members: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Arg>,
    {
        self.send(Command::new("SADD").args(key_with_values(key, members)))
    }

    pub fn srem<I, V>(&mut self, key: &str, members: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Arg>,
    {
        self.send(Command::new("SREM").args(key_with_values(key, members)))
    }

    pub fn hset(&mut self, name: &str, field: &str, value: impl Into<Arg>) -> StoreResult<()> {
        self.send(Command::new("HSET").arg(name).arg(field).arg(value))
    }

    pub fn hmset<I, F, V>(&mut self, name: &str, fields: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Arg>,
        V: Into<Arg>,
    {
        self.send(hmset_command(name, fields))
    }

    pub fn hdel<I, V>(&mut self, name: &str, fields: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Arg>,
    {
        self.send(Command::new("HDEL").args(key_with_values(name, fields)))
    }
}

impl Drop for TransactionBatch {
    fn drop(&mut self) {
        if !self.is_closed() {
            debug!(queued = self.queued, "dropping uncommitted transaction");
        }
    }
}
