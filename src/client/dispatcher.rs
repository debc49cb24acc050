//! Fan-out of inbound envelopes to registered listeners.
//!
//! Listeners are invoked in registration order, outside the registry lock,
//! so a listener may register or unregister others while it runs. A
//! listener that returns an error or panics is logged on its own; the
//! remaining listeners and the transport are unaffected.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use uuid::Uuid;

use crate::domain::Envelope;

/// Callback invoked once per inbound envelope.
pub type Listener = Arc<dyn Fn(&Envelope) -> anyhow::Result<()> + Send + Sync>;

type Registry = Mutex<Vec<(Uuid, Listener)>>;

/// Owns the listener registrations of one client.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.len())
            .finish()
    }
}

impl Dispatcher {
    /// An empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` and returns the capability to remove it.
    ///
    /// No history is replayed: only envelopes arriving after this call are
    /// delivered.
    pub fn register<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&Envelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        lock(&self.registry).push((id, Arc::new(listener)));
        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Decodes one text frame and dispatches it.
    ///
    /// Malformed frames are logged and dropped. Returns the number of
    /// listeners that handled the envelope without error.
    pub fn dispatch_frame(&self, frame: &str) -> usize {
        match Envelope::decode(frame) {
            Ok(envelope) => self.dispatch(&envelope),
            Err(err) => {
                tracing::warn!(error = %err, len = frame.len(), "dropping malformed inbound frame");
                0
            }
        }
    }

    /// Invokes every registered listener with `envelope`.
    ///
    /// Returns the number of listeners that handled it without error.
    pub fn dispatch(&self, envelope: &Envelope) -> usize {
        let snapshot: Vec<(Uuid, Listener)> = lock(&self.registry)
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        let mut handled = 0;
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(envelope))) {
                Ok(Ok(())) => handled += 1,
                Ok(Err(err)) => {
                    tracing::warn!(listener = %id, kind = envelope.kind(), error = %err, "listener failed");
                }
                Err(_) => {
                    tracing::error!(listener = %id, kind = envelope.kind(), "listener panicked");
                }
            }
        }
        handled
    }

    /// Removes every registration.
    pub fn clear(&self) {
        lock(&self.registry).clear();
    }

    /// Number of live registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.registry).len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Capability to remove exactly one registration.
///
/// Dropping the handle does not unregister the listener.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: Uuid,
    registry: Weak<Registry>,
}

impl ListenerHandle {
    /// Unique id of the registration.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Removes the registration.
    ///
    /// Returns `false` if it was already gone (unregistered earlier, or
    /// cleared by a disconnect).
    pub fn unregister(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut listeners = lock(&registry);
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != self.id);
        listeners.len() != before
    }
}

fn lock(registry: &Registry) -> MutexGuard<'_, Vec<(Uuid, Listener)>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}
