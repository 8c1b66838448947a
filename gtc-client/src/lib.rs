//! # GTC Store Client
//!
//! Purpose: Provide a blocking key-value store client that namespaces keys
//! with a per-handle prefix and groups writes into single-use `MULTI`/`EXEC`
//! batches.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse TCP connections across calls.
//! 2. **Scoped Acquisition**: Borrowed connections return to the pool on drop.
//! 3. **Idempotent Prefixing**: Keys are prefixed once, never twice.
//! 4. **Protocol Clarity**: Encode/parse RESP2 explicitly for correctness.
//!
//! ```no_run
//! use gtc_client::{PrefixedStore, StoreConfig};
//!
//! # fn main() -> gtc_client::StoreResult<()> {
//! let store = PrefixedStore::with_config(StoreConfig {
//!     url: "redis://127.0.0.1:6379/0".into(),
//!     prefix: "app:".into(),
//!     ..StoreConfig::default()
//! })?;
//! store.set("greeting", "hello")?; // writes app:greeting
//!
//! let mut batch = store.begin_transaction()?;
//! batch.rpush("queue", ["a", "b"])?;
//! batch.delete("greeting")?;
//! let replies = batch.commit()?;
//! assert_eq!(replies.len(), 2);
//! # Ok(())
//! # }
//! ```

mod command;
mod config;
mod error;
mod pool;
mod reply;
mod resp;
mod store;
mod transaction;
mod url;

pub use command::{is_prefix_eligible, key_with_values, Arg, Command, PREFIXED_COMMANDS};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use reply::KeyTtl;
pub use resp::Reply;
pub use store::{PrefixedStore, ACK_OK};
pub use transaction::TransactionBatch;
pub use url::ConnectionInfo;
