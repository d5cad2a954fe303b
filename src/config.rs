//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The WebSocket origin policy lives
//! here as an ordinary value handed to the router, so different routers in
//! the same process (tests included) can run with different policies.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;

use crate::error::GatewayError;

/// Which browser origins may open a WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginPolicy {
    /// Accept every request regardless of its `Origin` header.
    #[default]
    AllowAll,
    /// Accept only the listed origins (exact match, e.g. `https://ui.example.com`).
    ///
    /// Requests without an `Origin` header come from non-browser clients
    /// and are accepted.
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Checks a request's `Origin` header against the policy.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::OriginRejected`] when the origin is not
    /// allowed or is not valid UTF-8 under an allow-list.
    pub fn check(&self, origin: Option<&HeaderValue>) -> Result<(), GatewayError> {
        let Self::AllowList(allowed) = self else {
            return Ok(());
        };
        let Some(origin) = origin else {
            return Ok(());
        };
        let origin = origin
            .to_str()
            .map_err(|_| GatewayError::OriginRejected("<non-ascii>".to_string()))?;
        if allowed.iter().any(|a| a == origin) {
            Ok(())
        } else {
            Err(GatewayError::OriginRejected(origin.to_string()))
        }
    }
}

impl FromStr for OriginPolicy {
    type Err = GatewayError;

    /// `*` (or an empty string) means allow all; otherwise a comma-separated
    /// list of origins.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::AllowAll);
        }
        Ok(Self::AllowList(split_list(s)))
    }
}

/// What to do with a connection that cannot keep up with its region's
/// event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlowClientPolicy {
    /// Keep the connection; the region channel overwrites the oldest
    /// events the client has not consumed yet.
    #[default]
    DropOldest,
    /// Close the connection as soon as it falls behind.
    Disconnect,
}

impl FromStr for SlowClientPolicy {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop_oldest" | "drop-oldest" => Ok(Self::DropOldest),
            "disconnect" => Ok(Self::Disconnect),
            other => Err(GatewayError::Config(format!(
                "unknown slow client policy: {other}"
            ))),
        }
    }
}

/// Per-connection tuning shared by every WebSocket the gateway serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Bound of each connection's outbound queue.
    pub queue_capacity: usize,
    /// Keepalive ping period; `None` disables pings.
    pub ping_interval: Option<Duration>,
    /// Behaviour when the client falls behind its region stream.
    pub slow_client: SlowClientPolicy,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            ping_interval: Some(Duration::from_secs(30)),
            slow_client: SlowClientPolicy::default(),
        }
    }
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Backend API address recorded in every region's client metadata.
    pub nomad_addr: String,

    /// Regions registered at startup, in order.
    pub regions: Vec<String>,

    /// Capacity of each region's broadcast channel.
    pub region_channel_capacity: usize,

    /// Bound of each connection's outbound queue.
    pub connection_queue_capacity: usize,

    /// Seconds between keepalive pings (0 = disabled).
    pub ping_interval_secs: u64,

    /// Slow-client handling.
    pub slow_client_policy: SlowClientPolicy,

    /// Allowed WebSocket origins.
    pub origin_policy: OriginPolicy,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `LISTEN_ADDR` cannot be parsed
    /// as a [`SocketAddr`] or `SLOW_CLIENT_POLICY` names an unknown policy.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e| GatewayError::Config(format!("invalid LISTEN_ADDR: {e}")))?;

        let nomad_addr =
            std::env::var("NOMAD_ADDR").unwrap_or_else(|_| "http://127.0.0.1:4646".to_string());

        let regions = std::env::var("NOMAD_REGIONS")
            .map(|v| split_list(&v))
            .unwrap_or_else(|_| vec!["global".to_string()]);

        let region_channel_capacity = parse_env("REGION_CHANNEL_CAPACITY", 1024);
        let connection_queue_capacity = parse_env("CONNECTION_QUEUE_CAPACITY", 256);
        let ping_interval_secs = parse_env("PING_INTERVAL_SECS", 30);

        let slow_client_policy = match std::env::var("SLOW_CLIENT_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => SlowClientPolicy::default(),
        };

        let origin_policy = match std::env::var("ALLOWED_ORIGINS") {
            Ok(v) => v.parse()?,
            Err(_) => OriginPolicy::default(),
        };

        Ok(Self {
            listen_addr,
            nomad_addr,
            regions,
            region_channel_capacity,
            connection_queue_capacity,
            ping_interval_secs,
            slow_client_policy,
            origin_policy,
        })
    }

    /// Derives the per-connection options from this configuration.
    #[must_use]
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            queue_capacity: self.connection_queue_capacity.max(1),
            ping_interval: (self.ping_interval_secs > 0)
                .then(|| Duration::from_secs(self.ping_interval_secs)),
            slow_client: self.slow_client_policy,
        }
    }
}

/// Splits a comma-separated list, trimming entries and skipping empty ones.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
