//! Connection string parsing.
//!
//! Accepts `redis://[user[:password]@][host][:port][/db]` and bare
//! `host:port`. TLS (`rediss://`) is not supported.

use crate::error::{StoreError, StoreResult};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 6379;
const SCHEME: &str = "redis://";

/// Parsed connection target and optional session setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// `host:port` ready for socket address resolution.
    pub addr: String,
    /// ACL user name, sent with AUTH when present.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Database index selected after connect.
    pub db: Option<u32>,
}

impl ConnectionInfo {
    /// Parses a connection string.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let raw = raw.trim();
        let rest = match raw.strip_prefix(SCHEME) {
            Some(rest) => rest,
            None if raw.contains("://") => {
                return Err(StoreError::InvalidUrl(format!("unsupported scheme in {raw:?}")));
            }
            None => {
                return Ok(ConnectionInfo {
                    addr: host_port(raw)?,
                    username: None,
                    password: None,
                    db: None,
                });
            }
        };

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };

        let (userinfo, hostport) = match authority.rsplit_once('@') {
            Some((userinfo, hostport)) => (Some(userinfo), hostport),
            None => (None, authority),
        };

        let (username, password) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((user, pass)) => (non_empty(user), non_empty(pass)),
                None => (non_empty(info), None),
            },
            None => (None, None),
        };

        let db = match path.trim_end_matches('/') {
            "" => None,
            index => Some(
                index
                    .parse::<u32>()
                    .map_err(|_| StoreError::InvalidUrl(format!("invalid database {index:?}")))?,
            ),
        };

        Ok(ConnectionInfo {
            addr: host_port(hostport)?,
            username,
            password,
            db,
        })
    }
}

fn host_port(raw: &str) -> StoreResult<String> {
    // Bracketed IPv6 literals carry colons inside the host part.
    let (host, port) = match raw.rfind(':') {
        Some(idx) if !raw[idx..].contains(']') => (&raw[..idx], &raw[idx + 1..]),
        _ => (raw, ""),
    };
    let host = if host.is_empty() { DEFAULT_HOST } else { host };
    let port = if port.is_empty() {
        DEFAULT_PORT
    } else {
        port.parse::<u16>()
            .map_err(|_| StoreError::InvalidUrl(format!("invalid port {port:?}")))?
    };
    Ok(format!("{host}:{port}"))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
