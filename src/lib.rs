//! # hearth-realtime
//!
//! Real-time message transport for the Hearth social network: live chat
//! messages and notifications over a persistent WebSocket.
//!
//! The crate has two halves:
//!
//! - [`client::RealtimeClient`]: one authenticated connection per user
//!   session, with bounded exponential-backoff reconnection, fan-out to any
//!   number of listeners, and best-effort sends that are dropped (never
//!   queued) while the connection is down.
//! - The relay server (`ws/`, `api/`): binds each socket to the identity
//!   from its `auth` handshake and routes envelopes to the recipient's
//!   sockets.
//!
//! ## Architecture
//!
//! ```text
//! Application code
//!     │
//!     ├── RealtimeClient (client/)
//!     │     ├── Dispatcher ──► listeners
//!     │     ├── ReconnectPolicy
//!     │     └── Connector ──► WebSocket
//!     │
//! Relay server
//!     ├── WS Handler (ws/) ──► SessionBinding
//!     ├── REST Handlers (api/)
//!     └── RelayBus (domain/)
//! ```

pub mod api;
pub mod app;
pub mod app_state;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod telemetry;
pub mod ws;
