//! Best-effort outbound writes.
//!
//! Sends go out only while the connection is open. Anything else is
//! dropped with a warning; there is no queue to flush on reconnect.

use super::state::ConnectionState;
use super::transport::Link;
use crate::domain::Envelope;

/// Serializes `envelope` and writes it to `link` when `state` is
/// [`ConnectionState::Connected`].
///
/// Returns whether the frame reached the transport.
pub(crate) fn deliver(state: ConnectionState, link: Option<&Link>, envelope: &Envelope) -> bool {
    let Some(link) = link.filter(|_| state == ConnectionState::Connected) else {
        tracing::warn!(kind = envelope.kind(), %state, "connection not open; dropping outbound envelope");
        return false;
    };
    let frame = match envelope.encode() {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(kind = envelope.kind(), error = %err, "cannot encode outbound envelope");
            return false;
        }
    };
    match link.write(frame) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(kind = envelope.kind(), error = %err, "outbound write failed");
            false
        }
    }
}
