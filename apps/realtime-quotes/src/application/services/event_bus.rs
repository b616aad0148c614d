//! Event Bus
//!
//! Synchronous listener registry plus a `tokio::sync::broadcast` channel
//! for async consumers.
//!
//! Listeners run on the emitting task with no lock held: kind-specific
//! listeners first, then catch-all ones, each group in registration order.
//! A panicking listener is logged and skipped; the rest still run. Once
//! [`EventBus::close`] is called every emit is dropped.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::application::events::{EventKind, RealtimeEvent};

/// Listener callback.
pub type Listener = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Default capacity of the async event stream.
pub const DEFAULT_STREAM_CAPACITY: usize = 1_024;

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    any: Vec<(ListenerId, Listener)>,
}

impl Registry {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    fn remove(&mut self, kind: Option<EventKind>, id: ListenerId) -> bool {
        let list = match kind {
            Some(kind) => match self.by_kind.get_mut(&kind) {
                Some(list) => list,
                None => return false,
            },
            None => &mut self.any,
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        before != list.len()
    }

    fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .chain(self.any.iter())
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

/// Handle returned by [`EventBus::on`] and [`EventBus::on_any`].
///
/// Dropping the handle does not unregister; call
/// [`ListenerHandle::unsubscribe`].
#[derive(Debug)]
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct ListenerHandle {
    id: ListenerId,
    kind: Option<EventKind>,
    registry: Weak<Mutex<Registry>>,
}

impl ListenerHandle {
    /// Registration id.
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.lock().remove(self.kind, self.id))
    }
}

/// Typed fan-out of [`RealtimeEvent`]s.
///
/// # Example
///
/// ```rust
/// use realtime_quotes::application::events::{EventKind, RealtimeEvent};
/// use realtime_quotes::application::services::EventBus;
///
/// let bus = EventBus::new();
/// let handle = bus.on(EventKind::PriceUpdatesStopped, |event| {
///     println!("{} at {}", event.kind(), event.timestamp());
/// });
///
/// bus.emit(RealtimeEvent::PriceUpdatesStopped { timestamp: chrono::Utc::now() });
/// assert!(handle.unsubscribe());
/// ```
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
    stream_tx: broadcast::Sender<RealtimeEvent>,
    closed: AtomicBool,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("stream_receivers", &self.stream_tx.receiver_count())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl EventBus {
    /// Bus with the default stream capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STREAM_CAPACITY)
    }

    /// Bus whose async stream buffers `capacity` events per receiver.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (stream_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            stream_tx,
            closed: AtomicBool::new(false),
        }
    }

    /// Register a listener for one kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = registry.allocate();
        registry
            .by_kind
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        ListenerHandle {
            id,
            kind: Some(kind),
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register a listener for every kind.
    pub fn on_any<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = registry.allocate();
        registry.any.push((id, Arc::new(listener)));
        ListenerHandle {
            id,
            kind: None,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Remove a listener registered with [`EventBus::on`].
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.registry.lock().remove(Some(kind), id)
    }

    /// Subscribe to the async stream of all events.
    #[must_use]
    pub fn stream(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.stream_tx.subscribe()
    }

    /// Deliver an event to its listeners and the async stream.
    pub fn emit(&self, event: RealtimeEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let kind = event.kind();
        let listeners = self.registry.lock().snapshot(kind);

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                tracing::error!(event = %kind, "Event listener panicked");
            }
        }

        // No receivers is the common case.
        let _ = self.stream_tx.send(event);
    }

    /// Number of registered listeners across all kinds.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let registry = self.registry.lock();
        registry.any.len() + registry.by_kind.values().map(Vec::len).sum::<usize>()
    }

    /// Remove every listener.
    pub fn clear(&self) {
        let mut registry = self.registry.lock();
        registry.by_kind.clear();
        registry.any.clear();
    }

    /// Clear listeners and drop all future emits.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.clear();
    }

    /// True after [`EventBus::close`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
