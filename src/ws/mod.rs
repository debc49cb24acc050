//! WebSocket relay: upgrade handling, the per-socket session loop, and
//! identity binding.
//!
//! The endpoint at `/ws` expects an `auth` frame first, then relays chat
//! messages and notifications between authenticated users.

pub mod binding;
pub mod connection;
pub mod handler;
