//! Connection manager: the client handle and the driver task behind it.
//!
//! A [`RealtimeClient`] owns one driver task. Every lifecycle event
//! (handle commands, open results, inbound frames, transport closure,
//! retry timers) is handled sequentially by that task, so no two events
//! for one connection ever run concurrently and state needs no locking.
//!
//! ```text
//! Disconnected --connect()--> Connecting --open ok--> Connected
//!      ^                          |                       |
//!      +------ open failed -------+---- abnormal close ---+   (retry scheduled)
//! any --disconnect()--> Closing --> Disconnected               (no retry)
//! ```

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Sleep;

use super::backoff::ReconnectPolicy;
use super::dispatcher::{Dispatcher, ListenerHandle};
use super::endpoint::websocket_url;
use super::handshake;
use super::outbound;
use super::session::SessionSource;
use super::state::{ConnectionState, ConnectionStatus};
use super::transport::{Connector, Link, WsConnector};
use crate::config::ClientConfig;
use crate::domain::envelope::{MESSAGE, NOTIFICATION};
use crate::domain::{ChatMessage, Envelope, Notification, UserId};
use crate::error::{RealtimeError, TransportError};

/// Requests from handles to the driver.
#[derive(Debug)]
enum Command {
    Connect(UserId),
    Disconnect(oneshot::Sender<()>),
    Send(Envelope),
}

/// Handle to one logical real-time session.
///
/// Cloning the handle shares the session. The driver task stops, closing
/// any transport, once every clone is dropped. Clones held inside a
/// registered listener count too: a listener that needs to talk back to the
/// client should capture a [`WeakRealtimeClient`] from [`Self::downgrade`],
/// otherwise the session lives until [`Self::disconnect`] clears the
/// listeners.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    commands: mpsc::UnboundedSender<Command>,
    dispatcher: Dispatcher,
    status: watch::Receiver<ConnectionStatus>,
    endpoint: Arc<str>,
}

impl RealtimeClient {
    /// Creates a client that connects over WebSocket.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidEndpoint`] if the configured origin
    /// cannot be turned into a WebSocket URL.
    pub fn new(config: &ClientConfig) -> Result<Self, RealtimeError> {
        Self::with_connector(config, WsConnector)
    }

    /// Creates a client that opens transports through `connector`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidEndpoint`] if the configured origin
    /// cannot be turned into a WebSocket URL.
    pub fn with_connector(
        config: &ClientConfig,
        connector: impl Connector,
    ) -> Result<Self, RealtimeError> {
        let endpoint: Arc<str> = websocket_url(&config.origin, &config.path)?.into();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let dispatcher = Dispatcher::new();

        let driver = Driver::new(
            Arc::new(connector),
            Arc::clone(&endpoint),
            commands_rx,
            dispatcher.clone(),
            status_tx,
            ReconnectPolicy::new(config.backoff),
        );
        tokio::spawn(driver.run());

        Ok(Self {
            commands: commands_tx,
            dispatcher,
            status: status_rx,
            endpoint,
        })
    }

    /// Opens the session for `user`.
    ///
    /// A no-op while already connected; joins an open that is in flight.
    /// Otherwise any pending retry is cancelled, the backoff is reset, and
    /// a new transport is opened. Returns once the request is queued; watch
    /// [`Self::subscribe_status`] for the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::MissingIdentity`] for a blank identity (no
    /// transport is opened) and [`RealtimeError::ClientClosed`] if the
    /// driver has stopped.
    pub fn connect(&self, user: impl Into<String>) -> Result<(), RealtimeError> {
        let user = UserId::new(user)?;
        self.connect_user(user)
    }

    /// Opens the session for an already validated identity.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ClientClosed`] if the driver has stopped.
    pub fn connect_user(&self, user: UserId) -> Result<(), RealtimeError> {
        self.commands
            .send(Command::Connect(user))
            .map_err(|_| RealtimeError::ClientClosed)
    }

    /// Opens the session for whoever `session` reports as signed in.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::MissingIdentity`] when nobody is signed in,
    /// and [`RealtimeError::ClientClosed`] if the driver has stopped.
    pub fn connect_session(&self, session: &impl SessionSource) -> Result<(), RealtimeError> {
        let user = session
            .current_user()
            .ok_or(RealtimeError::MissingIdentity)?;
        self.connect_user(user)
    }

    /// Ends the session: closes the transport, cancels any scheduled retry,
    /// and drops the identity and every listener.
    ///
    /// Resolves once the driver has finished the teardown.
    pub async fn disconnect(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(Command::Disconnect(done_tx)).is_err() {
            tracing::debug!("disconnect on a stopped client");
            return;
        }
        let _ = done_rx.await;
    }

    /// Sends `envelope` if the connection is open; otherwise drops it with
    /// a warning. Never queues.
    pub fn send(&self, envelope: Envelope) {
        if self.commands.send(Command::Send(envelope)).is_err() {
            tracing::warn!("realtime client stopped; dropping outbound envelope");
        }
    }

    /// Sends a chat message.
    pub fn send_message(&self, message: &ChatMessage) {
        self.send_typed(MESSAGE, message);
    }

    /// Sends a notification.
    pub fn send_notification(&self, notification: &Notification) {
        self.send_typed(NOTIFICATION, notification);
    }

    fn send_typed<T: serde::Serialize>(&self, kind: &str, payload: &T) {
        match Envelope::from_payload(kind, payload) {
            Ok(envelope) => self.send(envelope),
            Err(err) => tracing::warn!(kind, error = %err, "cannot build outbound envelope"),
        }
    }

    /// Registers a listener for inbound envelopes.
    ///
    /// Safe in any state. Registrations are cleared by
    /// [`Self::disconnect`].
    pub fn on_message<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&Envelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.register(listener)
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.dispatcher.len()
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Receiver notified on every status change.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Waits until the client reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ClientClosed`] if the driver stops first.
    pub async fn wait_for_state(
        &self,
        state: ConnectionState,
    ) -> Result<ConnectionStatus, RealtimeError> {
        let mut status = self.status.clone();
        let reached = status
            .wait_for(|s| s.state == state)
            .await
            .map_err(|_| RealtimeError::ClientClosed)?;
        Ok(*reached)
    }

    /// WebSocket URL this client connects to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// A handle that does not keep the session alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakRealtimeClient {
        WeakRealtimeClient {
            commands: self.commands.downgrade(),
            dispatcher: self.dispatcher.clone(),
            status: self.status.clone(),
            endpoint: Arc::clone(&self.endpoint),
        }
    }
}

/// Non-owning handle to a [`RealtimeClient`] session, meant to be captured
/// by listeners.
#[derive(Debug, Clone)]
pub struct WeakRealtimeClient {
    commands: mpsc::WeakUnboundedSender<Command>,
    dispatcher: Dispatcher,
    status: watch::Receiver<ConnectionStatus>,
    endpoint: Arc<str>,
}

impl WeakRealtimeClient {
    /// Returns a full handle, or `None` once every [`RealtimeClient`] for
    /// the session has been dropped.
    #[must_use]
    pub fn upgrade(&self) -> Option<RealtimeClient> {
        let commands = self.commands.upgrade()?;
        Some(RealtimeClient {
            commands,
            dispatcher: self.dispatcher.clone(),
            status: self.status.clone(),
            endpoint: Arc::clone(&self.endpoint),
        })
    }
}

/// Owner of all mutable connection state.
struct Driver {
    connector: Arc<dyn Connector>,
    endpoint: Arc<str>,
    commands: mpsc::UnboundedReceiver<Command>,
    dispatcher: Dispatcher,
    status: watch::Sender<ConnectionStatus>,
    policy: ReconnectPolicy,
    identity: Option<UserId>,
    /// Cleared by an explicit disconnect; checked before every retry.
    live: bool,
    exhausted: bool,
    link: Option<Link>,
    opening: Option<BoxFuture<'static, Result<Link, TransportError>>>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    fn new(
        connector: Arc<dyn Connector>,
        endpoint: Arc<str>,
        commands: mpsc::UnboundedReceiver<Command>,
        dispatcher: Dispatcher,
        status: watch::Sender<ConnectionStatus>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            connector,
            endpoint,
            commands,
            dispatcher,
            status,
            policy,
            identity: None,
            live: false,
            exhausted: false,
            link: None,
            opening: None,
            retry: None,
        }
    }

    async fn run(mut self) {
        while self.step().await {}
        self.disconnect();
        tracing::debug!(endpoint = %self.endpoint, "realtime driver stopped");
    }

    /// Handles the next event. Returns `false` once every handle is gone.
    ///
    /// Commands are polled first so a queued disconnect always beats a
    /// retry timer that fired in the same turn.
    async fn step(&mut self) -> bool {
        tokio::select! {
            biased;
            command = self.commands.recv() => match command {
                Some(command) => self.handle(command),
                None => return false,
            },
            opened = open_result(&mut self.opening) => {
                self.opening = None;
                self.on_open_result(opened);
            }
            frame = next_frame(&mut self.link) => match frame {
                Some(frame) => {
                    self.dispatcher.dispatch_frame(&frame);
                }
                None => self.on_transport_closed(),
            },
            () = retry_due(&mut self.retry) => {
                self.retry = None;
                self.on_retry_due();
            }
        }
        true
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Connect(user) => self.connect(user),
            Command::Disconnect(done) => {
                self.disconnect();
                let _ = done.send(());
            }
            Command::Send(envelope) => {
                outbound::deliver(self.state(), self.link.as_ref(), &envelope);
            }
        }
    }

    fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    fn publish(&self, state: ConnectionState) {
        let attempts = self.policy.attempts();
        let exhausted = self.exhausted;
        self.status.send_modify(|status| {
            status.state = state;
            status.reconnect_attempts = attempts;
            status.exhausted = exhausted;
        });
    }

    fn connect(&mut self, user: UserId) {
        if self.state() == ConnectionState::Connected {
            tracing::debug!(user = %user, "already connected; ignoring connect");
            return;
        }
        self.identity = Some(user);
        self.live = true;
        if self.opening.is_some() {
            tracing::debug!("open already in flight; joining it");
            return;
        }
        self.retry = None;
        self.exhausted = false;
        self.policy.reset();
        self.begin_open();
    }

    fn begin_open(&mut self) {
        tracing::info!(
            endpoint = %self.endpoint,
            attempt = self.policy.attempts(),
            "opening realtime transport"
        );
        self.opening = Some(self.connector.open(&self.endpoint));
        self.publish(ConnectionState::Connecting);
    }

    fn on_open_result(&mut self, result: Result<Link, TransportError>) {
        match result {
            Ok(link) => {
                let Some(user) = self.identity.clone() else {
                    tracing::error!("transport opened without an identity; closing it");
                    self.publish(ConnectionState::Disconnected);
                    return;
                };
                self.policy.reset();
                self.exhausted = false;
                self.publish(ConnectionState::Connected);
                handshake::authenticate(&link, &user);
                self.link = Some(link);
                tracing::info!(endpoint = %self.endpoint, user = %user, "realtime transport open");
            }
            Err(err) => {
                tracing::warn!(endpoint = %self.endpoint, error = %err, "realtime transport failed to open");
                self.schedule_retry();
                self.publish(ConnectionState::Disconnected);
            }
        }
    }

    fn on_transport_closed(&mut self) {
        self.link = None;
        tracing::warn!(endpoint = %self.endpoint, "realtime transport closed unexpectedly");
        self.schedule_retry();
        self.publish(ConnectionState::Disconnected);
    }

    fn schedule_retry(&mut self) {
        if !self.live {
            return;
        }
        match self.policy.next_delay() {
            Some(delay) => {
                tracing::info!(attempt = self.policy.attempts(), ?delay, "scheduling reconnect");
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
            }
            None => {
                self.exhausted = true;
                tracing::error!(
                    attempts = self.policy.attempts(),
                    "reconnect attempts exhausted; giving up"
                );
            }
        }
    }

    fn on_retry_due(&mut self) {
        if !self.live || self.identity.is_none() {
            tracing::debug!("session ended; reconnect suppressed");
            return;
        }
        self.begin_open();
    }

    fn disconnect(&mut self) {
        self.live = false;
        self.identity = None;
        self.retry = None;
        self.opening = None;
        self.exhausted = false;
        self.publish(ConnectionState::Closing);
        if self.link.take().is_some() {
            tracing::info!(endpoint = %self.endpoint, "realtime transport closed by client");
        }
        self.dispatcher.clear();
        self.policy.reset();
        self.publish(ConnectionState::Disconnected);
    }
}

async fn open_result(
    opening: &mut Option<BoxFuture<'static, Result<Link, TransportError>>>,
) -> Result<Link, TransportError> {
    match opening {
        Some(open) => open.await,
        None => pending().await,
    }
}

async fn next_frame(link: &mut Option<Link>) -> Option<String> {
    match link {
        Some(link) => link.recv().await,
        None => pending().await,
    }
}

async fn retry_due(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::client::backoff::BackoffConfig;

    struct CountingConnector {
        opens: Arc<AtomicUsize>,
    }

    impl Connector for CountingConnector {
        fn open(&self, _url: &str) -> BoxFuture<'static, Result<Link, TransportError>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let (link, _peer) = Link::pair();
            Box::pin(async move { Ok(link) })
        }
    }

    fn driver(
        opens: &Arc<AtomicUsize>,
    ) -> (
        Driver,
        mpsc::UnboundedSender<Command>,
        watch::Receiver<ConnectionStatus>,
    ) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let driver = Driver::new(
            Arc::new(CountingConnector {
                opens: Arc::clone(opens),
            }),
            Arc::from("ws://hearth.test/ws"),
            commands_rx,
            Dispatcher::new(),
            status_tx,
            ReconnectPolicy::new(BackoffConfig::default()),
        );
        (driver, commands_tx, status_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn queued_disconnect_beats_a_due_retry() {
        let opens = Arc::new(AtomicUsize::new(0));
        let (mut driver, commands, status) = driver(&opens);
        let Ok(user) = UserId::new("alice") else {
            panic!("expected valid id");
        };
        driver.identity = Some(user);
        driver.live = true;
        driver.retry = Some(Box::pin(tokio::time::sleep(Duration::ZERO)));
        let (done_tx, _done_rx) = oneshot::channel();
        assert!(commands.send(Command::Disconnect(done_tx)).is_ok());

        assert!(driver.step().await);
        assert_eq!(opens.load(Ordering::SeqCst), 0);
        assert!(driver.retry.is_none());
        assert!(driver.opening.is_none());
        assert_eq!(status.borrow().state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn step_stops_once_every_handle_is_gone() {
        let opens = Arc::new(AtomicUsize::new(0));
        let (mut driver, commands, _status) = driver(&opens);
        drop(commands);
        assert!(!driver.step().await);
    }
}
