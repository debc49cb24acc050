//! Identity assertion sent as the first frame of every connection.

use super::outbound;
use super::state::ConnectionState;
use super::transport::Link;
use crate::domain::{Envelope, UserId};

/// Sends the `auth` envelope for `user` over a freshly opened `link`.
///
/// Fire-and-forget: no acknowledgement is awaited. Returns whether the
/// frame was written.
pub(crate) fn authenticate(link: &Link, user: &UserId) -> bool {
    tracing::debug!(user = %user, "sending auth handshake");
    outbound::deliver(ConnectionState::Connected, Some(link), &Envelope::auth(user))
}
