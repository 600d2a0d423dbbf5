//! Per-node event bus
//!
//! Each node owns an [`EventBus`]. Publishing with [`Propagation::Bubble`]
//! delivers to the node's own subscribers, then to every ancestor's bus in
//! order. Handlers run synchronously with no bus lock held, so a handler may
//! publish, subscribe or call `set_state` re-entrantly.
//!
//! Dispatch works on a snapshot of the handler list: handlers added during a
//! dispatch do not see the in-flight event, and handlers whose
//! [`Subscription`] is closed during a dispatch are skipped from then on.

use crate::node::SceneNode;
use crate::state::{SceneState, StatePatch};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Emitted by every `set_state`
#[derive(Debug, Clone)]
pub struct StateChangedEvent {
    /// Snapshot before the change
    pub previous: Arc<SceneState>,
    /// Snapshot after the change
    pub next: Arc<SceneState>,
    /// The patch that was applied
    pub partial: StatePatch,
    /// Node whose state changed
    pub source: SceneNode,
}

/// Application defined event
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
    /// Event name
    pub name: String,
    /// Payload
    pub payload: serde_json::Value,
}

impl CustomEvent {
    /// Create a custom event
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Events carried by the bus
#[derive(Debug, Clone)]
pub enum SceneEvent {
    /// A node's state changed
    StateChanged(StateChangedEvent),
    /// Application defined event
    Custom(CustomEvent),
}

impl SceneEvent {
    /// Whether a subscription for `kind` receives this event
    #[must_use]
    pub fn matches(&self, kind: &EventKind) -> bool {
        match (kind, self) {
            (EventKind::Any, _) | (EventKind::StateChanged, SceneEvent::StateChanged(_)) => true,
            (EventKind::Custom(name), SceneEvent::Custom(event)) => *name == event.name,
            _ => false,
        }
    }
}

/// Subscription filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Every event
    Any,
    /// [`SceneEvent::StateChanged`]
    StateChanged,
    /// [`SceneEvent::Custom`] with this name
    Custom(String),
}

/// How far an event travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// This node, then each ancestor up to the root
    #[default]
    Bubble,
    /// This node only
    Local,
}

/// Event handler callback
pub type EventHandler = Arc<dyn Fn(&SceneEvent) + Send + Sync>;

struct HandlerEntry {
    id: u64,
    kind: EventKind,
    handler: EventHandler,
    closed: Arc<AtomicBool>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    handlers: Mutex<Vec<HandlerEntry>>,
}

/// Event bus owned by one node
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus with no subscribers
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events matching `kind`
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&SceneEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let closed = Arc::new(AtomicBool::new(false));
        self.inner.handlers.lock().push(HandlerEntry {
            id,
            kind,
            handler: Arc::new(handler),
            closed: Arc::clone(&closed),
        });

        let bus: Weak<BusInner> = Arc::downgrade(&self.inner);
        Subscription::new(closed, move || {
            if let Some(bus) = bus.upgrade() {
                // The handler may own subscriptions to this bus; drop it unlocked.
                let removed = {
                    let mut handlers = bus.handlers.lock();
                    handlers
                        .iter()
                        .position(|entry| entry.id == id)
                        .map(|index| handlers.remove(index))
                };
                drop(removed);
            }
        })
    }

    /// Deliver `event` to this bus's matching handlers
    pub fn dispatch(&self, event: &SceneEvent) {
        let snapshot: Vec<(EventHandler, Arc<AtomicBool>)> = self
            .inner
            .handlers
            .lock()
            .iter()
            .filter(|entry| event.matches(&entry.kind))
            .map(|entry| (Arc::clone(&entry.handler), Arc::clone(&entry.closed)))
            .collect();

        for (handler, closed) in snapshot {
            if !closed.load(Ordering::Acquire) {
                handler(event);
            }
        }
    }

    /// Number of live handlers
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.lock().len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Handle to a registered callback
///
/// Closing (via [`Subscription::unsubscribe`] or drop) stops delivery
/// immediately, including for a dispatch already in progress.
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    closed: Arc<AtomicBool>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Create a subscription that runs `on_close` when closed
    ///
    /// `closed` is shared with whoever dispatches to the callback.
    pub fn new(closed: Arc<AtomicBool>, on_close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            closed,
            on_close: Some(Box::new(on_close)),
        }
    }

    /// Stop delivery; idempotent
    pub fn unsubscribe(&mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }

    /// Whether the subscription has been closed
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
