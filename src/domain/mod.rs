//! Domain layer: identities, the wire envelope, typed payloads, and the
//! relay bus shared by server-side sockets.

pub mod envelope;
pub mod payload;
pub mod relay_bus;
pub mod user_id;

pub use envelope::Envelope;
pub use payload::{AuthFrame, ChatMessage, ErrorFrame, Notification, NotificationKind, Payload};
pub use relay_bus::{Delivery, RelayBus};
pub use user_id::UserId;
