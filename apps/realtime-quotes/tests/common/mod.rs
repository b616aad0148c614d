//! Shared fixtures for the realtime integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use realtime_quotes::infrastructure::mock::ScriptedQuoteSource;
use realtime_quotes::infrastructure::network::ManualNetworkStatus;
use realtime_quotes::{
    ConnectionChange, ConnectionState, EventKind, ListenerHandle, RealtimeConfig,
    RealtimeDataService, RealtimeEvent,
};

/// Service wired to a scripted source and a manual network switch.
pub struct Harness {
    pub service: RealtimeDataService,
    pub source: Arc<ScriptedQuoteSource>,
    pub network: Arc<ManualNetworkStatus>,
    pub events: EventRecorder,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RealtimeConfig::default())
    }

    pub fn with_config(config: RealtimeConfig) -> Self {
        let source = Arc::new(ScriptedQuoteSource::new());
        let network = Arc::new(ManualNetworkStatus::new(true));
        let service = RealtimeDataService::new(config, source.clone(), network.clone());
        service.init();
        let events = EventRecorder::attach(&service);

        Self {
            service,
            source,
            network,
            events,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.service.connection_state().state
    }
}

/// Let spawned tasks run without moving the paused clock far.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Captures every event with the (paused) clock reading at emission.
#[derive(Clone)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<(Instant, RealtimeEvent)>>>,
    _handle: Arc<ListenerHandle>,
}

impl EventRecorder {
    pub fn attach(service: &RealtimeDataService) -> Self {
        let events: Arc<Mutex<Vec<(Instant, RealtimeEvent)>>> = Arc::default();
        let sink = Arc::clone(&events);
        let handle = service.on_any(move |event| {
            sink.lock().push((Instant::now(), event.clone()));
        });
        Self {
            events,
            _handle: Arc::new(handle),
        }
    }

    pub fn all(&self) -> Vec<RealtimeEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn timed(&self) -> Vec<(Instant, RealtimeEvent)> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|(_, e)| e.kind()).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(_, e)| e.kind() == kind)
            .count()
    }

    /// Connection transitions in order.
    pub fn changes(&self) -> Vec<(ConnectionState, ConnectionChange)> {
        self.events
            .lock()
            .iter()
            .filter_map(|(_, e)| match e {
                RealtimeEvent::ConnectionStateChanged { state, change, .. } => {
                    Some((*state, change.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn last_change(&self) -> Option<ConnectionChange> {
        self.changes().pop().map(|(_, change)| change)
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
