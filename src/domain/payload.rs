//! Typed payloads for the envelope kinds the application knows about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;

/// Closed view over an [`super::Envelope`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `auth`: identity assertion sent first on every connection.
    Auth(AuthFrame),
    /// `message`: direct chat message.
    Message(ChatMessage),
    /// `notification`: activity notification.
    Notification(Notification),
    /// `error`: report from the relay.
    Error(ErrorFrame),
    /// Any other kind; the raw envelope carries the data.
    Other,
}

/// Fields of an `auth` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFrame {
    /// Asserted identity.
    pub user_id: UserId,
}

/// Fields of a `message` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// User the message is addressed to.
    pub recipient_id: UserId,
    /// Author. Stamped by the relay from the socket's bound identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    /// Message body.
    pub content: String,
    /// Conversation thread, if the application groups messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Time the relay accepted the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// A message to `recipient` with the given body.
    #[must_use]
    pub fn new(recipient: UserId, content: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient,
            sender_id: None,
            content: content.into(),
            conversation_id: None,
            sent_at: None,
        }
    }
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Someone liked a post or story.
    Like,
    /// Someone commented on a post.
    Comment,
    /// Someone started following the recipient.
    Follow,
    /// Someone mentioned the recipient.
    Mention,
    /// A new direct message arrived.
    Message,
    /// Anything newer than this build knows about.
    #[serde(other)]
    Other,
}

/// Fields of a `notification` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// User the notification is for.
    pub recipient_id: UserId,
    /// Category.
    pub kind: NotificationKind,
    /// User who triggered it. Stamped by the relay for socket-originated
    /// notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<UserId>,
    /// Display text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Post, story, or conversation the notification points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// A notification of `kind` for `recipient`.
    #[must_use]
    pub fn new(recipient: UserId, kind: NotificationKind) -> Self {
        Self {
            recipient_id: recipient,
            kind,
            actor_id: None,
            text: None,
            reference_id: None,
            created_at: None,
        }
    }
}

/// Fields of an `error` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    /// Numeric code, HTTP-flavoured (400, 401, 404, 409).
    pub code: u16,
    /// Human-readable reason.
    pub message: String,
}
