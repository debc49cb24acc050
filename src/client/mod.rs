//! Client side of the real-time transport.
//!
//! [`RealtimeClient`] holds one persistent connection per user session. It
//! authenticates on open, reconnects with bounded exponential backoff after
//! abnormal closures, fans inbound envelopes out to any number of
//! listeners, and drops outbound sends while the connection is not open.

pub mod backoff;
pub mod dispatcher;
pub mod endpoint;
mod handshake;
pub mod manager;
mod outbound;
pub mod session;
pub mod state;
pub mod transport;

pub use backoff::{BackoffConfig, ReconnectPolicy};
pub use dispatcher::{Dispatcher, Listener, ListenerHandle};
pub use endpoint::websocket_url;
pub use manager::{RealtimeClient, WeakRealtimeClient};
pub use session::{SessionSource, StaticSession};
pub use state::{ConnectionState, ConnectionStatus};
pub use transport::{Connector, Link, LinkPeer, WsConnector};
