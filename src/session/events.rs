//! Session notifications for subscribers.
//!
//! Listeners are invoked synchronously on the thread that emits the event,
//! which is the session queue for everything except metadata objects (those
//! arrive on a framework thread). Listeners must not block.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::SessionState;
use crate::error::HostError;
use crate::platform::MetadataObject;

/// Something that happened to the session outside a host request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// The platform reported a runtime error.
    RuntimeError { message: String },
    /// The session was restarted automatically after a runtime error.
    Recovered,
    /// A repeated runtime error stopped the session.
    Fatal { error: HostError },
    MetadataObjects { objects: Vec<MetadataObject> },
}

pub type EventListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Handle returned by [`EventEmitter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Fan-out of session events to registered listeners.
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Arc<RwLock<Vec<(u64, EventListener)>>>,
    next_id: Arc<AtomicU64>,
}

impl EventEmitter {
    pub fn subscribe(&self, listener: EventListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push((id, listener));
        Subscription(id)
    }

    /// Returns false if the subscription was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription.0);
        listeners.len() != before
    }

    pub fn emit(&self, event: &SessionEvent) {
        // Listeners may subscribe from inside a callback.
        let listeners: Vec<EventListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
