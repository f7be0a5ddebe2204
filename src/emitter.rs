//! A thread-safe registry of event subscribers.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use crate::{Event, EventKind};

/// Event handler.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<(u64, Handler)>>>,
}

impl Registry {
    fn handlers(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<(u64, Handler)>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Dispatches [`Event`]s to handlers subscribed to their [`EventKind`].
///
/// Handlers run synchronously on the emitting thread, in subscription order, and outside of the
/// registry lock, so a handler may subscribe, unsubscribe or emit without deadlocking. A handler
/// that panics aborts delivery of that event to the remaining handlers.
#[derive(Default)]
pub struct Emitter {
    registry: Arc<Registry>,
}

impl Emitter {
    /// Create an emitter with no handlers.
    pub fn new() -> Self {
        Emitter::default()
    }

    /// Subscribe `handler` to events of `kind`.
    ///
    /// Returns a [`Subscription`] that removes exactly this registration when
    /// [`unsubscribed`](Subscription::unsubscribe).
    pub fn on(
        &self,
        kind: EventKind,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .handlers()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Deliver `event` to every handler subscribed to its kind at the time of the call.
    pub fn emit(&self, event: &Event) {
        let handlers: Vec<Handler> = match self.registry.handlers().get(&event.kind()) {
            Some(handlers) => handlers.iter().map(|(_, h)| h.clone()).collect(),
            None => return,
        };

        for handler in handlers {
            handler(event);
        }
    }

    /// Drop every subscription for every event kind.
    pub fn remove_all(&self) {
        self.registry.handlers().clear();
    }

    /// Number of handlers currently registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.registry.handlers().get(&kind).map_or(0, Vec::len)
    }
}

/// Handle to a single event subscription.
///
/// Dropping the handle does not unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    registry: Weak<Registry>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// Remove the handler. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut handlers = registry.handlers();
        if let Some(handlers) = handlers.get_mut(&self.kind) {
            handlers.retain(|(id, _)| *id != self.id);
        }
    }
}
