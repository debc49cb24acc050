//! Broadcast channel for addressed deliveries.
//!
//! [`RelayBus`] wraps a [`tokio::sync::broadcast`] channel. Every socket
//! session subscribes once and forwards only the deliveries addressed to
//! the user it is bound to.

use tokio::sync::broadcast;

use super::{Envelope, UserId};

/// An envelope on its way to one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// User the envelope is for.
    pub recipient: UserId,
    /// The envelope, forwarded verbatim.
    pub envelope: Envelope,
}

/// Broadcast bus for [`Delivery`] values.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity.
/// When the ring buffer is full, the oldest deliveries are dropped for
/// lagging receivers.
#[derive(Debug, Clone)]
pub struct RelayBus {
    sender: broadcast::Sender<Delivery>,
}

impl RelayBus {
    /// Creates a new `RelayBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a delivery to all subscribed sessions.
    ///
    /// Returns the number of sessions that saw it. With no live sessions
    /// the delivery is silently dropped.
    pub fn publish(&self, delivery: Delivery) -> usize {
        self.sender.send(delivery).unwrap_or(0)
    }

    /// Creates a receiver for all future deliveries.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.sender.subscribe()
    }

    /// Returns the current number of live sessions.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
