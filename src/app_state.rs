//! Shared application state injected into all Axum handlers.

use std::time::Duration;

use crate::domain::RelayBus;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Relay bus shared by every WebSocket session.
    pub bus: RelayBus,
    /// Time a socket may stay unauthenticated.
    pub auth_timeout: Duration,
}
