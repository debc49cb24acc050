//! Transport seam between the connection manager and the network.
//!
//! A [`Connector`] opens a [`Link`]: a pair of channels carrying text
//! frames. The link's inbound side ending (`recv` yields `None`) is the
//! close signal; dropping the link closes the transport. [`WsConnector`]
//! backs a link with a `tokio-tungstenite` socket, and [`Link::pair`]
//! gives an in-memory link for embedding and tests.

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::TransportError;

/// Opens transports to an endpoint URL.
pub trait Connector: Send + Sync + 'static {
    /// Starts opening a transport to `url`.
    ///
    /// The returned future resolves once the transport is open or has
    /// failed to open.
    fn open(&self, url: &str) -> BoxFuture<'static, Result<Link, TransportError>>;
}

/// Client end of an open transport.
#[derive(Debug)]
pub struct Link {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl Link {
    /// Wraps a pair of frame channels.
    #[must_use]
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// An in-memory link and the peer end that drives it.
    #[must_use]
    pub fn pair() -> (Self, LinkPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Self::new(out_tx, in_rx),
            LinkPeer {
                written: out_rx,
                deliver: in_tx,
            },
        )
    }

    /// Writes one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the transport is gone.
    pub fn write(&self, frame: String) -> Result<(), TransportError> {
        self.outbound.send(frame).map_err(|_| TransportError::Closed)
    }

    /// Waits for the next inbound frame; `None` means the transport closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }
}

/// Remote end of an in-memory [`Link`].
#[derive(Debug)]
pub struct LinkPeer {
    /// Frames the client wrote, in write order.
    pub written: mpsc::UnboundedReceiver<String>,
    /// Sender for frames the client should receive. Dropping it closes the
    /// link from the remote side.
    pub deliver: mpsc::UnboundedSender<String>,
}

impl LinkPeer {
    /// Delivers one frame to the client. Returns `false` if the client end
    /// is gone.
    pub fn send(&self, frame: impl Into<String>) -> bool {
        self.deliver.send(frame.into()).is_ok()
    }

    /// Closes the link as if the network dropped, returning the frames the
    /// client wrote so far.
    pub fn hang_up(self) -> mpsc::UnboundedReceiver<String> {
        self.written
    }
}

/// Opens WebSocket transports with `tokio-tungstenite`.
///
/// Each link gets a pump task that bridges the socket and the link's
/// channels. The pump sends a close frame when the client drops its link,
/// and ends the link when the socket closes or errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<Link, TransportError>> {
        let url = url.to_string();
        Box::pin(async move {
            let (socket, _response) = connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::Open(e.to_string()))?;
            let (mut ws_tx, mut ws_rx) = socket.split();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
            let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        frame = out_rx.recv() => {
                            match frame {
                                Some(text) => {
                                    if let Err(e) = ws_tx.send(Message::text(text)).await {
                                        tracing::warn!(error = %e, "ws write failed");
                                        break;
                                    }
                                }
                                None => {
                                    let _ = ws_tx.send(Message::Close(None)).await;
                                    break;
                                }
                            }
                        }
                        msg = ws_rx.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    if in_tx.send(text.as_str().to_owned()).is_err() {
                                        break;
                                    }
                                }
                                Some(Ok(Message::Close(frame))) => {
                                    tracing::debug!(?frame, "ws closed by peer");
                                    break;
                                }
                                None => break,
                                Some(Err(e)) => {
                                    tracing::warn!(error = %e, "ws read failed");
                                    break;
                                }
                                Some(Ok(_)) => {}
                            }
                        }
                    }
                }
                tracing::debug!("ws pump finished");
            });

            Ok(Link::new(out_tx, in_rx))
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_carries_frames_both_ways() {
        let (mut link, mut peer) = Link::pair();
        assert!(link.write("out".to_string()).is_ok());
        assert_eq!(peer.written.recv().await.as_deref(), Some("out"));
        assert!(peer.send("in"));
        assert_eq!(link.recv().await.as_deref(), Some("in"));
    }

    #[tokio::test]
    async fn hang_up_ends_inbound() {
        let (mut link, peer) = Link::pair();
        let _written = peer.hang_up();
        assert_eq!(link.recv().await, None);
    }

    #[tokio::test]
    async fn dropping_link_is_visible_to_peer() {
        let (link, mut peer) = Link::pair();
        drop(link);
        assert_eq!(peer.written.recv().await, None);
        assert!(!peer.send("late"));
    }

    #[tokio::test]
    async fn ws_connector_reports_open_failure() {
        let result = WsConnector.open("ws://127.0.0.1:1/ws").await;
        assert!(matches!(result, Err(TransportError::Open(_))));
    }
}
