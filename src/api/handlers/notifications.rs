//! Server-originated notifications pushed to connected users.
//!
//! The CRUD side of the application calls this when a like, comment, or
//! follow happens; the notification reaches every socket bound to the
//! recipient.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::PublishResponse;
use crate::app_state::AppState;
use crate::domain::envelope::NOTIFICATION;
use crate::domain::{Delivery, Envelope, Notification};
use crate::error::RealtimeError;

/// Upper bound on notification display text, in bytes.
const MAX_TEXT_LEN: usize = 2000;

/// `POST /api/v1/notifications` — Push a notification to a user.
///
/// # Errors
///
/// Returns [`RealtimeError::InvalidRequest`] if the text is too long.
#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    tag = "Realtime",
    summary = "Push a notification",
    description = "Relays a notification to every live WebSocket session bound to the recipient. Best effort: offline users miss it.",
    request_body = Notification,
    responses(
        (status = 202, description = "Notification accepted for relay", body = PublishResponse),
        (status = 400, description = "Invalid notification"),
    )
)]
pub async fn publish_notification(
    State(state): State<AppState>,
    Json(mut notification): Json<Notification>,
) -> Result<impl IntoResponse, RealtimeError> {
    if notification
        .text
        .as_ref()
        .is_some_and(|text| text.len() > MAX_TEXT_LEN)
    {
        return Err(RealtimeError::InvalidRequest(format!(
            "text exceeds {MAX_TEXT_LEN} bytes"
        )));
    }
    if notification.created_at.is_none() {
        notification.created_at = Some(Utc::now());
    }

    let recipient = notification.recipient_id.clone();
    let envelope = Envelope::from_payload(NOTIFICATION, &notification)?;
    let sessions = state.bus.publish(Delivery {
        recipient: recipient.clone(),
        envelope,
    });
    tracing::debug!(recipient = %recipient, sessions, "notification published");

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishResponse {
            accepted: true,
            timestamp: Utc::now(),
        }),
    ))
}

/// Notification routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/notifications", post(publish_notification))
}
