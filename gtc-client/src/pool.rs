//! # Connection Pool
//!
//! Purpose: Hand out store connections one caller at a time and reuse them
//! across calls to avoid repeated TCP handshakes.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable connections.
//! 2. **Minimal Locking**: Hold the mutex only while moving idle connections
//!    or adjusting counters; sockets are opened outside the lock.
//! 3. **Scoped Acquisition**: [`PooledConnection`] returns itself on drop, so
//!    every exit path of a caller releases its slot.
//! 4. **Wait or Fail**: An exhausted pool either blocks on a condvar or fails
//!    immediately with `PoolExhausted`, per configuration.

use std::collections::VecDeque;
use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::error::{StoreError, StoreResult};
use crate::resp::{read_reply, Reply};
use crate::url::ConnectionInfo;

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Where to connect and how to set up each session.
    pub info: ConnectionInfo,
    /// Maximum number of idle connections to keep.
    pub max_idle: usize,
    /// Maximum open connections (idle + in-use). Zero means unlimited.
    pub max_active: usize,
    /// Idle connections older than this are closed. Zero disables eviction.
    pub idle_timeout: Duration,
    /// Block when `max_active` is reached instead of failing.
    pub wait: bool,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
}

struct IdleConnection {
    conn: Connection,
    since: Instant,
}

struct PoolState {
    // Most recently returned at the front.
    idle: VecDeque<IdleConnection>,
    // Open connections, idle or borrowed.
    total: usize,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
    released: Condvar,
}

/// Connection pool handle. Clones share the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates an empty pool; connections are opened lazily.
    pub fn new(config: PoolConfig) -> Self {
        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle),
            total: 0,
        };
        ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(state),
                released: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Borrows a connection, reusing an idle one when possible.
    ///
    /// Blocks while the pool is at `max_active` if `wait` is set; otherwise
    /// fails with [`StoreError::PoolExhausted`].
    pub fn acquire(&self) -> StoreResult<PooledConnection> {
        let config = &self.inner.config;
        let mut state = self.inner.state.lock();
        loop {
            let stale = evict_stale(&mut state, config.idle_timeout);
            if stale > 0 {
                debug!(stale, "closed idle connections past idle timeout");
                self.inner.released.notify_all();
            }

            if let Some(idle) = state.idle.pop_front() {
                trace!("reusing idle connection");
                return Ok(PooledConnection::new(self.inner.clone(), idle.conn));
            }

            if config.max_active == 0 || state.total < config.max_active {
                state.total += 1;
                break;
            }

            if !config.wait {
                return Err(StoreError::PoolExhausted);
            }
            trace!(max_active = config.max_active, "pool exhausted, waiting");
            self.inner.released.wait(&mut state);
        }
        drop(state);

        match Connection::open(config) {
            Ok(conn) => Ok(PooledConnection::new(self.inner.clone(), conn)),
            Err(err) => {
                warn!(addr = %config.info.addr, error = %err, "failed to open connection");
                self.release_slot();
                Err(err)
            }
        }
    }

    /// Number of open connections, idle or borrowed.
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().total
    }

    /// Number of idle connections ready for reuse.
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    fn release_slot(&self) {
        let mut state = self.inner.state.lock();
        state.total = state.total.saturating_sub(1);
        self.inner.released.notify_one();
    }

    fn return_connection(&self, conn: Connection) {
        let mut state = self.inner.state.lock();
        if state.idle.len() < self.inner.config.max_idle {
            state.idle.push_front(IdleConnection {
                conn,
                since: Instant::now(),
            });
        } else {
            state.total = state.total.saturating_sub(1);
            debug!("idle limit reached, closing returned connection");
        }
        self.inner.released.notify_one();
    }
}

fn evict_stale(state: &mut PoolState, idle_timeout: Duration) -> usize {
    if idle_timeout.is_zero() {
        return 0;
    }
    let mut evicted = 0;
    while state
        .idle
        .back()
        .is_some_and(|idle| idle.since.elapsed() > idle_timeout)
    {
        state.idle.pop_back();
        state.total = state.total.saturating_sub(1);
        evicted += 1;
    }
    evicted
}

/// RAII guard for a borrowed connection.
///
/// Dropping the guard returns a clean connection to the pool. A connection
/// that hit an IO/protocol failure, still has unread replies or sits inside
/// an open `MULTI` block is closed instead.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Option<Connection>,
    broken: bool,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, conn: Connection) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            broken: false,
        }
    }

    fn conn(&mut self) -> &mut Connection {
        // Only `Drop` takes the connection out.
        match self.conn.as_mut() {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }

    /// Buffers a command without flushing or reading its reply.
    pub fn send(&mut self, command: &Command) -> StoreResult<()> {
        self.conn().send(command);
        Ok(())
    }

    /// Flushes buffered commands plus `command`, reads every pending reply and
    /// returns the reply to `command`.
    ///
    /// The first server error among the pending replies wins over the final
    /// reply.
    pub fn execute(&mut self, command: &Command) -> StoreResult<Reply> {
        // Stays set if the round trip unwinds with bytes left on the stream.
        let was_broken = std::mem::replace(&mut self.broken, true);
        let result = self.conn().execute(command);
        self.broken = was_broken || matches!(&result, Err(err) if err.breaks_connection());
        result
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return,
        };

        let pool = ConnectionPool {
            inner: self.pool.clone(),
        };

        if self.broken {
            warn!("discarding broken connection");
            pool.release_slot();
        } else if !conn.is_clean() {
            debug!(
                pending = conn.pending,
                in_multi = conn.in_multi,
                "closing connection with unfinished work"
            );
            pool.release_slot();
        } else {
            pool.return_connection(conn);
        }
    }
}

/// Single TCP connection with reusable buffers.
pub struct Connection {
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: BytesMut,
    // Commands sent whose replies have not been read yet.
    pending: usize,
    in_multi: bool,
}

impl Connection {
    fn open(config: &PoolConfig) -> StoreResult<Self> {
        let stream = connect_stream(&config.info.addr, config.connect_timeout)?;
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;

        let mut conn = Connection {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: BytesMut::with_capacity(256),
            pending: 0,
            in_multi: false,
        };

        let info = &config.info;
        if let Some(password) = &info.password {
            let auth = match &info.username {
                Some(user) => Command::new("AUTH").arg(user).arg(password),
                None => Command::new("AUTH").arg(password),
            };
            conn.execute(&auth)?;
        }
        if let Some(db) = info.db {
            conn.execute(&Command::new("SELECT").arg(db))?;
        }

        debug!(addr = %info.addr, db = ?info.db, "opened connection");
        Ok(conn)
    }

    fn send(&mut self, command: &Command) {
        trace!(command = command.name(), "buffered");
        command.encode(&mut self.write_buf);
        self.pending += 1;
        if command.name() == "MULTI" {
            self.in_multi = true;
        }
    }

    fn execute(&mut self, command: &Command) -> StoreResult<Reply> {
        trace!(command = command.name(), pending = self.pending, "execute");
        command.encode(&mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;
        self.write_buf.clear();

        let mut first_error = None;
        while self.pending > 0 {
            let reply = read_reply(&mut self.reader, &mut self.line_buf)?;
            self.pending -= 1;
            if let Reply::Error(message) = reply {
                first_error.get_or_insert(StoreError::Server { message });
            }
        }

        let reply = read_reply(&mut self.reader, &mut self.line_buf)?;
        match command.name() {
            "MULTI" => self.in_multi = true,
            "EXEC" | "DISCARD" => self.in_multi = false,
            _ => {}
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        match reply {
            Reply::Error(message) => Err(StoreError::Server { message }),
            reply => Ok(reply),
        }
    }

    fn is_clean(&self) -> bool {
        self.pending == 0 && self.write_buf.is_empty() && !self.in_multi
    }
}

fn connect_stream(addr: &str, timeout: Option<Duration>) -> StoreResult<TcpStream> {
    let addrs: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(StoreError::InvalidUrl(format!("{addr} resolved to no address")));
    }

    let mut last_err = None;
    for candidate in addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(StoreError::Io(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotConnected, "no address connected")
    })))
}
