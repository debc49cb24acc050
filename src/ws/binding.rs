//! Per-socket identity binding.
//!
//! Records which user a WebSocket session authenticated as and decides
//! which relay deliveries the session forwards.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Delivery, UserId};

/// Identity bound to one authenticated WebSocket session.
#[derive(Debug, Clone)]
pub struct SessionBinding {
    session_id: Uuid,
    user: UserId,
    bound_at: DateTime<Utc>,
}

impl SessionBinding {
    /// Binds a fresh session to `user`.
    #[must_use]
    pub fn new(user: UserId) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user,
            bound_at: Utc::now(),
        }
    }

    /// The bound user.
    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Unique id of this session, for logs.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// When the auth handshake completed.
    #[must_use]
    pub fn bound_at(&self) -> DateTime<Utc> {
        self.bound_at
    }

    /// Returns `true` if `delivery` is addressed to the bound user.
    #[must_use]
    pub fn accepts(&self, delivery: &Delivery) -> bool {
        delivery.recipient == self.user
    }
}
