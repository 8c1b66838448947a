//! # Store Errors
//!
//! Every fallible client call returns [`StoreResult`]. The variants split into
//! transport failures (propagated untouched from the socket, the pool or the
//! server) and failures this crate detects itself: reply decoding, missing
//! write acknowledgements and use of a committed transaction batch.

use thiserror::Error;

/// Result type for the store client.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or IO failure while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RESP2 framing violation.
    #[error("protocol error: {0}")]
    Protocol(&'static str),
    /// Server answered with an error reply.
    #[error("server error: {message}")]
    Server { message: String },
    /// Pool is at `max_active` and configured not to wait.
    #[error("connection pool exhausted")]
    PoolExhausted,
    /// Connection string could not be parsed.
    #[error("invalid connection url: {0}")]
    InvalidUrl(String),
    /// Configuration document could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
    /// Reply shape did not match the type the command decodes into.
    #[error("cannot decode {found} reply as {expected}")]
    Decode {
        expected: &'static str,
        found: &'static str,
    },
    /// Write completed at the transport level but the server did not answer
    /// with the success token.
    #[error("{command} not acknowledged: server replied {status:?}")]
    NotAcknowledged { command: String, status: String },
    /// The transaction batch was already committed.
    #[error("transaction batch closed")]
    BatchClosed,
}

impl StoreError {
    /// Returns true for failures that originate below this crate: socket,
    /// pool, framing or server errors.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StoreError::Io(_)
                | StoreError::Protocol(_)
                | StoreError::Server { .. }
                | StoreError::PoolExhausted
                | StoreError::InvalidUrl(_)
        )
    }

    /// Returns true when the connection that produced this error must not be
    /// reused.
    pub(crate) fn breaks_connection(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Protocol(_))
    }
}
