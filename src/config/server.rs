//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use super::parse::{env_or, env_parse, Source};
use super::ConfigError;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEADER_TIMEOUT_SECS: u64 = 5;

/// Transport settings for [`crate::server::Server`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to (LISTEN_ADDR).
    pub listen_addr: SocketAddr,
    /// How long in-flight connections may run after shutdown starts
    /// (DRAIN_TIMEOUT_SECS).
    pub drain_timeout: Duration,
    /// Time a client gets to send request headers (HEADER_TIMEOUT_SECS).
    pub header_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            drain_timeout: Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS),
            header_timeout: Duration::from_secs(DEFAULT_HEADER_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    pub fn from_source(src: &(impl Source + ?Sized)) -> Result<Self, ConfigError> {
        let addr = env_or(src, "LISTEN_ADDR", DEFAULT_LISTEN_ADDR);
        let listen_addr = addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::Parse {
            key: "LISTEN_ADDR".into(),
            value: addr.clone(),
            error: e.to_string(),
        })?;

        let header_timeout = env_parse(src, "HEADER_TIMEOUT_SECS", DEFAULT_HEADER_TIMEOUT_SECS)?;
        if header_timeout == 0 {
            return Err(ConfigError::Invalid {
                key: "HEADER_TIMEOUT_SECS".into(),
                message: "must be at least 1 second".into(),
            });
        }

        Ok(Self {
            listen_addr,
            drain_timeout: Duration::from_secs(env_parse(
                src,
                "DRAIN_TIMEOUT_SECS",
                DEFAULT_DRAIN_TIMEOUT_SECS,
            )?),
            header_timeout: Duration::from_secs(header_timeout),
        })
    }
}
