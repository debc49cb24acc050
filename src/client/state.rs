//! Connection lifecycle state and the observable status snapshot.

use std::fmt;

use serde::Serialize;

/// Lifecycle state of the single transport owned by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No transport. Initial and terminal state.
    #[default]
    Disconnected,
    /// A transport open is in flight.
    Connecting,
    /// The transport is open and the handshake has been sent.
    Connected,
    /// An explicit disconnect is tearing the transport down.
    Closing,
}

impl ConnectionState {
    /// Lowercase name for display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionStatus {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Reconnect attempts claimed since the last successful open.
    pub reconnect_attempts: u32,
    /// The retry ceiling was reached; no further automatic attempts.
    pub exhausted: bool,
}
