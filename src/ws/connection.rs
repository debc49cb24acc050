//! Server-side WebSocket session.
//!
//! A session first waits for the `auth` handshake, then runs the
//! read/write loop: inbound chat messages and notifications are stamped
//! with the bound identity and published on the relay bus, and deliveries
//! addressed to the bound user are written back to the socket.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;

use super::binding::SessionBinding;
use crate::domain::envelope::{MESSAGE, NOTIFICATION};
use crate::domain::{Delivery, Envelope, Payload, RelayBus, UserId};

type WsSink = SplitSink<WebSocket, Message>;
type WsSource = SplitStream<WebSocket>;

/// Runs one WebSocket session until either side closes.
///
/// The socket is closed if no valid `auth` frame arrives within
/// `auth_timeout`.
pub async fn run_connection(socket: WebSocket, bus: RelayBus, auth_timeout: Duration) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let user = match tokio::time::timeout(auth_timeout, await_auth(&mut ws_tx, &mut ws_rx)).await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::debug!("ws closed before authenticating");
            return;
        }
        Err(_) => {
            tracing::warn!(?auth_timeout, "ws auth handshake timed out");
            let _ = send_envelope(&mut ws_tx, &Envelope::error(401, "authentication timed out"))
                .await;
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };

    let binding = SessionBinding::new(user);
    let mut deliveries = bus.subscribe();
    tracing::info!(session = %binding.session_id(), user = %binding.user(), "ws session authenticated");

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text_message(text.as_str(), &binding, &bus)
                            && send_envelope(&mut ws_tx, &reply).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            delivery = deliveries.recv() => {
                match delivery {
                    Ok(delivery) => {
                        if binding.accepts(&delivery)
                            && send_envelope(&mut ws_tx, &delivery.envelope).await.is_err() {
                                break;
                            }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, user = %binding.user(), "ws session lagged behind relay bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!(session = %binding.session_id(), user = %binding.user(), "ws session closed");
}

/// Reads frames until a valid `auth` envelope arrives.
///
/// Anything else is answered with an error frame. Returns `None` if the
/// socket closes first.
async fn await_auth(ws_tx: &mut WsSink, ws_rx: &mut WsSource) -> Option<UserId> {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => match authenticate_frame(text.as_str()) {
                Ok(user) => return Some(user),
                Err(reply) => {
                    if send_envelope(ws_tx, &reply).await.is_err() {
                        return None;
                    }
                }
            },
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

/// Extracts the asserted identity from a pre-auth frame, or the error
/// envelope to answer it with.
fn authenticate_frame(text: &str) -> Result<UserId, Envelope> {
    let Ok(envelope) = Envelope::decode(text) else {
        return Err(Envelope::error(400, "malformed JSON"));
    };
    match envelope.payload() {
        Ok(Payload::Auth(frame)) => Ok(frame.user_id),
        Ok(_) => Err(Envelope::error(401, "authentication required")),
        Err(err) => Err(Envelope::error(400, err.to_string())),
    }
}

/// Handles a text frame from an authenticated client, returning an
/// optional reply.
fn handle_text_message(text: &str, binding: &SessionBinding, bus: &RelayBus) -> Option<Envelope> {
    let Ok(envelope) = Envelope::decode(text) else {
        return Some(Envelope::error(400, "malformed JSON"));
    };

    match envelope.payload() {
        Ok(Payload::Message(mut message)) => {
            message.sender_id = Some(binding.user().clone());
            if message.sent_at.is_none() {
                message.sent_at = Some(Utc::now());
            }
            let recipient = message.recipient_id.clone();
            relay(bus, recipient, MESSAGE, &message)
        }
        Ok(Payload::Notification(mut notification)) => {
            notification.actor_id = Some(binding.user().clone());
            if notification.created_at.is_none() {
                notification.created_at = Some(Utc::now());
            }
            let recipient = notification.recipient_id.clone();
            relay(bus, recipient, NOTIFICATION, &notification)
        }
        Ok(Payload::Auth(_)) => Some(Envelope::error(409, "already authenticated")),
        Ok(Payload::Error(_) | Payload::Other) => Some(Envelope::error(
            404,
            format!("unknown type {:?}", envelope.kind()),
        )),
        Err(err) => Some(Envelope::error(400, err.to_string())),
    }
}

/// Publishes a stamped payload to `recipient`.
fn relay<T: Serialize>(
    bus: &RelayBus,
    recipient: UserId,
    kind: &str,
    payload: &T,
) -> Option<Envelope> {
    match Envelope::from_payload(kind, payload) {
        Ok(envelope) => {
            let sessions = bus.publish(Delivery {
                recipient: recipient.clone(),
                envelope,
            });
            tracing::debug!(kind, recipient = %recipient, sessions, "relayed envelope");
            None
        }
        Err(err) => {
            tracing::error!(kind, error = %err, "cannot build relayed envelope");
            Some(Envelope::error(500, "internal error"))
        }
    }
}

async fn send_envelope(ws_tx: &mut WsSink, envelope: &Envelope) -> Result<(), axum::Error> {
    match envelope.encode() {
        Ok(json) => ws_tx.send(Message::text(json)).await,
        Err(err) => {
            tracing::warn!(kind = envelope.kind(), error = %err, "cannot encode envelope");
            Ok(())
        }
    }
}
