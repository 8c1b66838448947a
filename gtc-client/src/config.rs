//! # Store Configuration
//!
//! Purpose: Describe where the store lives, which key prefix a handle applies
//! and how the connection pool is sized.
//!
//! The configuration deserializes from JSON (durations as whole seconds):
//!
//! ```text
//! {
//!   "url": "redis://127.0.0.1:6379/0",
//!   "prefix": "app:",
//!   "max_idle": 5,
//!   "max_active": 500,
//!   "idle_timeout_secs": 300,
//!   "wait": true,
//!   "connect_timeout_secs": 2
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::StoreResult;
use crate::pool::PoolConfig;
use crate::url::ConnectionInfo;

/// Configuration for a [`PrefixedStore`](crate::PrefixedStore) and its pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string, e.g. "redis://127.0.0.1:6379/0".
    pub url: String,
    /// Key prefix applied to prefix-eligible commands.
    pub prefix: String,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum open connections (idle + in-use). Zero means unlimited.
    pub max_active: usize,
    /// Idle connections older than this are closed. Zero disables eviction.
    #[serde(rename = "idle_timeout_secs", deserialize_with = "secs")]
    pub idle_timeout: Duration,
    /// Block on an exhausted pool instead of failing.
    pub wait: bool,
    /// Optional TCP connect timeout.
    #[serde(rename = "connect_timeout_secs", deserialize_with = "opt_secs")]
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout.
    #[serde(rename = "read_timeout_secs", deserialize_with = "opt_secs")]
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    #[serde(rename = "write_timeout_secs", deserialize_with = "opt_secs")]
    pub write_timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            url: "redis://127.0.0.1:6379".to_string(),
            prefix: String::new(),
            max_idle: 5,
            max_active: 500,
            idle_timeout: Duration::from_secs(5 * 60),
            wait: true,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl StoreConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(raw: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Resolves the connection string into pool settings.
    pub(crate) fn pool_config(&self) -> StoreResult<PoolConfig> {
        Ok(PoolConfig {
            info: ConnectionInfo::parse(&self.url)?,
            max_idle: self.max_idle,
            max_active: self.max_active,
            idle_timeout: self.idle_timeout,
            wait: self.wait,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        })
    }
}

fn secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    Ok(Duration::from_secs(u64::deserialize(deserializer)?))
}

fn opt_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
}
