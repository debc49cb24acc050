//! Configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable values fall back
//! to defaults. The `from_lookup` constructors take a lookup function so the
//! parsing can be exercised without touching the process environment.

use std::net::SocketAddr;
use std::time::Duration;

use crate::client::BackoffConfig;
use crate::error::RealtimeError;

/// Relay server configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Capacity of the relay bus broadcast channel.
    pub event_bus_capacity: usize,

    /// How long a fresh socket may stay unauthenticated before it is closed.
    pub auth_timeout: Duration,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Config`] if `LISTEN_ADDR` is set but cannot
    /// be parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, RealtimeError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Config`] if `LISTEN_ADDR` cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RealtimeError> {
        let raw_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let listen_addr: SocketAddr = raw_addr
            .parse()
            .map_err(|e| RealtimeError::Config(format!("LISTEN_ADDR {raw_addr:?}: {e}")))?;

        let event_bus_capacity = parse_var(&lookup, "EVENT_BUS_CAPACITY", 1024);
        let auth_timeout = Duration::from_secs(parse_var(&lookup, "AUTH_TIMEOUT_SECS", 10));

        Ok(Self {
            listen_addr,
            event_bus_capacity,
            auth_timeout,
        })
    }
}

/// Client-side configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Page origin the endpoint is derived from (e.g. `https://hearth.app`).
    pub origin: String,

    /// Upgrade path on the origin.
    pub path: String,

    /// Reconnection policy parameters.
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:3000".to_string(),
            path: "/ws".to_string(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ClientConfig {
    /// A default configuration pointing at `origin`.
    #[must_use]
    pub fn for_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let backoff = BackoffConfig {
            max_attempts: parse_var(
                &lookup,
                "RECONNECT_MAX_ATTEMPTS",
                defaults.backoff.max_attempts,
            ),
            initial_interval: Duration::from_millis(parse_var(
                &lookup,
                "RECONNECT_INITIAL_BACKOFF_MS",
                1000,
            )),
            max_interval: Duration::from_millis(parse_var(
                &lookup,
                "RECONNECT_MAX_BACKOFF_MS",
                30_000,
            )),
        };

        Self {
            origin: lookup("REALTIME_ORIGIN").unwrap_or(defaults.origin),
            path: lookup("REALTIME_PATH").unwrap_or(defaults.path),
            backoff,
        }
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
