//! Realtime Data Service
//!
//! Maintains one logical "live" connection over a stateless quote source:
//!
//! - a connection state machine driven by a market-status probe
//! - a subscription set polled by a periodic refresh loop
//! - a heartbeat that re-probes the source
//! - bounded exponential backoff when the source drops
//! - online/offline tracking through an injected [`NetworkStatus`]
//!
//! Every change is announced on the [`EventBus`].
//!
//! # Tasks
//!
//! Timers are Tokio tasks, each guarded by a child of the service's
//! shutdown token. State sits behind one mutex that is never held across an
//! `.await` or while listeners run. Methods that arm timers (`init`,
//! `connect`, `subscribe`) must be called inside a Tokio runtime.
//!
//! A refresh cycle runs to completion before the next tick is taken, so at
//! most one batch request is in flight. Ticks that fall inside a slow cycle
//! collapse into one that fires as soon as the cycle ends; the schedule
//! then resumes on the original period grid.

mod heartbeat;
mod network;
mod reconnect;
mod refresh;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub use reconnect::{ReconnectConfig, ReconnectPolicy};

use crate::application::events::{ConnectionChange, EventKind, RealtimeEvent};
use crate::application::ports::{BatchQuotes, NetworkStatus, QuoteSource, QuoteSourceError};
use crate::application::services::event_bus::{EventBus, ListenerHandle, ListenerId};
use crate::domain::connection::{ConnectionSnapshot, ConnectionState};
use crate::domain::market::MarketStatus;
use crate::domain::subscription::{SubscriptionSet, Symbol, SymbolError, normalize_symbol};
use crate::infrastructure::metrics;

// =============================================================================
// Configuration
// =============================================================================

/// Timing for the realtime manager.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeConfig {
    /// Period of the quote refresh loop.
    pub refresh_interval: Duration,
    /// Period of the heartbeat probe.
    pub heartbeat_interval: Duration,
    /// Wait between a failure and the start of the backoff sequence.
    pub reconnect_schedule_delay: Duration,
    /// Wait between coming back online and reconnecting.
    pub online_connect_delay: Duration,
    /// Backoff policy.
    pub reconnect: ReconnectConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(60),
            reconnect_schedule_delay: Duration::from_secs(1),
            online_connect_delay: Duration::from_secs(1),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Why `sync_data` did not produce a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The manager is not connected or the host is offline.
    #[error("not connected or offline")]
    NotConnected,

    /// `destroy()` was called.
    #[error("realtime service has been destroyed")]
    Destroyed,

    /// The quote source failed the whole batch.
    #[error(transparent)]
    Source(#[from] QuoteSourceError),
}

// =============================================================================
// Service
// =============================================================================

/// Connection and subscription manager.
///
/// Cheap to clone; clones share one manager.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use realtime_quotes::application::events::EventKind;
/// use realtime_quotes::application::services::realtime::{RealtimeConfig, RealtimeDataService};
/// use realtime_quotes::infrastructure::mock::ScriptedQuoteSource;
/// use realtime_quotes::infrastructure::network::ManualNetworkStatus;
///
/// # async fn example() {
/// let service = RealtimeDataService::new(
///     RealtimeConfig::default(),
///     Arc::new(ScriptedQuoteSource::new()),
///     Arc::new(ManualNetworkStatus::new(true)),
/// );
/// service.init();
///
/// let _updates = service.on(EventKind::PriceUpdate, |event| println!("{event:?}"));
/// service.subscribe("shop.to").unwrap();
/// service.connect().await;
///
/// service.destroy();
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeDataService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RealtimeDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeDataService")
            .field("snapshot", &self.connection_state())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

struct Inner {
    config: RealtimeConfig,
    source: Arc<dyn QuoteSource>,
    network: Arc<dyn NetworkStatus>,
    events: EventBus,
    state: Mutex<ManagerState>,
    shutdown: CancellationToken,
    destroyed: AtomicBool,
}

struct ManagerState {
    connection: ConnectionState,
    is_online: bool,
    subscriptions: SubscriptionSet,
    reconnect: ReconnectPolicy,
    last_update: Option<DateTime<Utc>>,
    last_heartbeat: Option<DateTime<Utc>>,
    /// Bumped on every connect attempt and forced disconnect so that a
    /// probe answering late can tell it has been superseded.
    epoch: u64,
    refresh_task: Option<CancellationToken>,
    heartbeat_task: Option<CancellationToken>,
    pending_reconnect: Option<CancellationToken>,
    network_task: Option<CancellationToken>,
}

fn cancel_slot(slot: &mut Option<CancellationToken>) -> bool {
    slot.take().map(|token| token.cancel()).is_some()
}

impl RealtimeDataService {
    /// Build a manager. Nothing is spawned until [`Self::init`] or
    /// [`Self::connect`].
    #[must_use]
    pub fn new(
        config: RealtimeConfig,
        source: Arc<dyn QuoteSource>,
        network: Arc<dyn NetworkStatus>,
    ) -> Self {
        let state = ManagerState {
            connection: ConnectionState::Disconnected,
            is_online: network.is_online(),
            subscriptions: SubscriptionSet::new(),
            reconnect: ReconnectPolicy::new(config.reconnect.clone()),
            last_update: None,
            last_heartbeat: None,
            epoch: 0,
            refresh_task: None,
            heartbeat_task: None,
            pending_reconnect: None,
            network_task: None,
        };

        Self {
            inner: Arc::new(Inner {
                config,
                source,
                network,
                events: EventBus::new(),
                state: Mutex::new(state),
                shutdown: CancellationToken::new(),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Start following the network status provider. Idempotent.
    pub fn init(&self) {
        self.inner.attach_network_watcher();
    }

    /// Probe the source and, on success, go live.
    ///
    /// No-op while connected or connecting. An explicit call also clears
    /// an exhausted reconnect counter and cancels any scheduled retry.
    pub async fn connect(&self) {
        self.inner.connect(true).await;
    }

    /// Go offline on purpose: stop timers and cancel scheduled retries.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Run one backoff step now: wait, then `connect()`. Gives up with a
    /// terminal event once the attempt limit is reached.
    pub async fn reconnect(&self) {
        let token = {
            let mut st = self.inner.state.lock();
            self.inner.replace_pending(&mut st)
        };
        Arc::clone(&self.inner).reconnect(token).await;
    }

    /// Add a symbol. Returns `Ok(true)` if the set changed.
    ///
    /// # Errors
    ///
    /// Returns [`SymbolError`] for an empty or malformed symbol.
    pub fn subscribe(&self, symbol: &str) -> Result<bool, SymbolError> {
        let symbol = normalize_symbol(symbol)?;
        Ok(self.inner.subscribe(symbol))
    }

    /// Remove a symbol. Returns `Ok(true)` if the set changed.
    ///
    /// # Errors
    ///
    /// Returns [`SymbolError`] for an empty or malformed symbol.
    pub fn unsubscribe(&self, symbol: &str) -> Result<bool, SymbolError> {
        let symbol = normalize_symbol(symbol)?;
        Ok(self.inner.unsubscribe(&symbol))
    }

    /// Subscribed symbols, sorted.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Symbol> {
        self.inner.state.lock().subscriptions.to_vec()
    }

    /// Read-only snapshot of the manager.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionSnapshot {
        let st = self.inner.state.lock();
        ConnectionSnapshot {
            state: st.connection,
            is_online: st.is_online,
            subscribed_symbols: st.subscriptions.to_vec(),
            last_update_time: st.last_update,
            last_heartbeat: st.last_heartbeat,
            reconnect_attempts: st.reconnect.attempt_count(),
        }
    }

    /// Fetch every subscription now, outside the refresh cadence.
    ///
    /// # Errors
    ///
    /// Fails fast with [`SyncError::NotConnected`] (no request made) when not
    /// connected or offline; [`SyncError::Source`] if the batch fails.
    pub async fn sync_data(&self) -> Result<BatchQuotes, SyncError> {
        self.inner.sync_data().await
    }

    /// Tear everything down. Safe to call more than once; nothing is
    /// emitted afterwards.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.shutdown.cancel();
        {
            let mut st = self.inner.state.lock();
            cancel_slot(&mut st.refresh_task);
            cancel_slot(&mut st.heartbeat_task);
            cancel_slot(&mut st.pending_reconnect);
            cancel_slot(&mut st.network_task);
            st.connection = ConnectionState::Disconnected;
        }
        self.inner.events.close();
        metrics::set_connection_state(ConnectionState::Disconnected);

        tracing::info!("Realtime data service destroyed");
    }

    /// True after [`Self::destroy`].
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    /// The event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener)
    }

    /// Register a listener for every event kind.
    pub fn on_any<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.inner.events.on_any(listener)
    }

    /// Remove a listener by id.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.events.off(kind, id)
    }

    /// Async stream of every event.
    #[must_use]
    pub fn stream(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.inner.events.stream()
    }
}

// =============================================================================
// Connection State Machine
// =============================================================================

impl Inner {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn emit(&self, event: RealtimeEvent) {
        if !self.is_destroyed() {
            self.events.emit(event);
        }
    }

    fn emit_state(&self, state: ConnectionState, change: ConnectionChange) {
        metrics::set_connection_state(state);
        self.emit(RealtimeEvent::ConnectionStateChanged {
            state,
            change,
            timestamp: Utc::now(),
        });
    }

    /// Swap in a fresh token for the scheduled-reconnect slot, cancelling
    /// whatever was pending.
    fn replace_pending(&self, st: &mut ManagerState) -> CancellationToken {
        let token = self.shutdown.child_token();
        if let Some(previous) = st.pending_reconnect.replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    async fn connect(self: &Arc<Self>, explicit: bool) {
        let epoch = {
            let mut st = self.state.lock();
            if self.is_destroyed()
                || matches!(
                    st.connection,
                    ConnectionState::Connected | ConnectionState::Connecting
                )
            {
                return;
            }
            if explicit {
                cancel_slot(&mut st.pending_reconnect);
                if st.reconnect.is_exhausted() {
                    st.reconnect.reset();
                }
            }
            st.connection = ConnectionState::Connecting;
            st.epoch += 1;
            st.epoch
        };

        tracing::info!(explicit, "Connecting to quote source");
        self.emit_state(ConnectionState::Connecting, ConnectionChange::Attempt);

        let result = tokio::select! {
            () = self.shutdown.cancelled() => return,
            result = self.source.market_status() => result,
        };

        match result {
            Ok(status) => self.on_connected(epoch, &status),
            Err(error) => self.on_connect_failed(epoch, &error),
        }
    }

    fn on_connected(self: &Arc<Self>, epoch: u64, status: &MarketStatus) {
        let start_refresh = {
            let mut st = self.state.lock();
            if self.is_destroyed()
                || st.epoch != epoch
                || st.connection != ConnectionState::Connecting
            {
                tracing::debug!("Ignoring superseded probe result");
                return;
            }
            st.connection = ConnectionState::Connected;
            st.reconnect.reset();
            cancel_slot(&mut st.pending_reconnect);
            !st.subscriptions.is_empty()
        };

        self.start_heartbeat();
        tracing::info!(
            market_open = status.is_open,
            session = status.session.label(),
            "Connected to quote source"
        );
        self.emit_state(ConnectionState::Connected, ConnectionChange::Established);

        if start_refresh {
            self.start_price_updates();
        }
    }

    fn on_connect_failed(self: &Arc<Self>, epoch: u64, error: &QuoteSourceError) {
        {
            let mut st = self.state.lock();
            if self.is_destroyed()
                || st.epoch != epoch
                || st.connection != ConnectionState::Connecting
            {
                tracing::debug!("Ignoring superseded probe failure");
                return;
            }
            st.connection = ConnectionState::Disconnected;
        }

        tracing::warn!(error = %error, "Connection attempt failed");
        self.emit_state(
            ConnectionState::Disconnected,
            ConnectionChange::Failed {
                error: error.to_string(),
            },
        );
        if error.is_retryable() {
            self.schedule_reconnect();
        } else {
            tracing::error!(error = %error, "Not retrying connection: configuration error");
        }
    }

    fn disconnect(&self) {
        {
            let mut st = self.state.lock();
            if self.is_destroyed() {
                return;
            }
            st.connection = ConnectionState::Disconnected;
            st.epoch += 1;
            cancel_slot(&mut st.pending_reconnect);
            cancel_slot(&mut st.heartbeat_task);
        }

        self.stop_price_updates();
        tracing::info!("Disconnected by user");
        self.emit_state(ConnectionState::Disconnected, ConnectionChange::UserInitiated);
    }

    /// Drop from `Connected` after a refresh or heartbeat found the source
    /// unreachable, then schedule a retry. No-op in any other state.
    fn mark_connection_lost(self: &Arc<Self>, error: String) {
        {
            let mut st = self.state.lock();
            if self.is_destroyed() || st.connection != ConnectionState::Connected {
                return;
            }
            st.connection = ConnectionState::Disconnected;
            st.epoch += 1;
            cancel_slot(&mut st.heartbeat_task);
        }

        tracing::warn!(error = %error, "Connection to quote source lost");
        self.emit_state(ConnectionState::Disconnected, ConnectionChange::Lost { error });
        self.schedule_reconnect();
    }

    /// After `reconnect_schedule_delay`, start a backoff step if still
    /// disconnected. Postponed (dropped) while offline; the online
    /// transition reconnects instead.
    fn schedule_reconnect(self: &Arc<Self>) {
        let token = {
            let mut st = self.state.lock();
            if self.is_destroyed() {
                return;
            }
            if !st.is_online {
                tracing::info!("Offline, postponing reconnection");
                return;
            }
            self.replace_pending(&mut st)
        };

        let inner = Arc::clone(self);
        let delay = self.config.reconnect_schedule_delay;
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            let disconnected = inner.state.lock().connection == ConnectionState::Disconnected;
            if disconnected {
                inner.reconnect(token).await;
            }
        });
    }

    /// One backoff step. Boxed because it re-enters `connect`, which can
    /// schedule another step.
    fn reconnect(self: Arc<Self>, token: CancellationToken) -> BoxFuture<'static, ()> {
        async move {
            let step = {
                let mut st = self.state.lock();
                if self.is_destroyed() {
                    return;
                }
                let max_attempts = st.reconnect.max_attempts();
                match st.reconnect.next_delay() {
                    Some(delay) => {
                        st.connection = ConnectionState::Reconnecting;
                        Ok((delay, st.reconnect.attempt_count(), max_attempts))
                    }
                    None => {
                        st.connection = ConnectionState::Disconnected;
                        Err(max_attempts)
                    }
                }
            };

            let (delay, attempt, max_attempts) = match step {
                Ok(step) => step,
                Err(max_attempts) => {
                    tracing::error!(max_attempts, "Max reconnection attempts reached");
                    self.emit_state(
                        ConnectionState::Disconnected,
                        ConnectionChange::RetriesExhausted { max_attempts },
                    );
                    return;
                }
            };

            metrics::record_reconnect_attempt(attempt);
            tracing::info!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting"
            );
            self.emit_state(
                ConnectionState::Reconnecting,
                ConnectionChange::Reconnecting {
                    attempt,
                    max_attempts,
                },
            );

            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }

            self.connect(false).await;
        }
        .boxed()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    fn subscribe(self: &Arc<Self>, symbol: Symbol) -> bool {
        let (total, start_refresh) = {
            let mut st = self.state.lock();
            if self.is_destroyed() || !st.subscriptions.insert(symbol.clone()) {
                return false;
            }
            (
                st.subscriptions.len(),
                st.connection == ConnectionState::Connected && st.refresh_task.is_none(),
            )
        };

        metrics::set_subscription_count(total);
        tracing::info!(symbol = %symbol, total, "Subscribed");
        self.emit(RealtimeEvent::SymbolSubscribed {
            symbol,
            total,
            timestamp: Utc::now(),
        });

        if start_refresh {
            self.start_price_updates();
        }
        true
    }

    fn unsubscribe(&self, symbol: &str) -> bool {
        let total = {
            let mut st = self.state.lock();
            if self.is_destroyed() || !st.subscriptions.remove(symbol) {
                return false;
            }
            st.subscriptions.len()
        };

        metrics::set_subscription_count(total);
        tracing::info!(symbol, total, "Unsubscribed");
        self.emit(RealtimeEvent::SymbolUnsubscribed {
            symbol: symbol.to_string(),
            total,
            timestamp: Utc::now(),
        });

        if total == 0 {
            self.stop_price_updates();
        }
        true
    }

    // =========================================================================
    // Manual Sync
    // =========================================================================

    async fn sync_data(&self) -> Result<BatchQuotes, SyncError> {
        let symbols = {
            let st = self.state.lock();
            if self.is_destroyed() {
                return Err(SyncError::Destroyed);
            }
            if st.connection != ConnectionState::Connected || !st.is_online {
                return Err(SyncError::NotConnected);
            }
            st.subscriptions.to_vec()
        };

        self.emit(RealtimeEvent::SyncStarted {
            symbols: symbols.clone(),
            timestamp: Utc::now(),
        });

        let result = if symbols.is_empty() {
            Ok(BatchQuotes::new())
        } else {
            tokio::select! {
                () = self.shutdown.cancelled() => return Err(SyncError::Destroyed),
                result = self.source.multiple_quotes(&symbols) => result,
            }
        };

        match result {
            Ok(batch) => {
                self.state.lock().last_update = Some(Utc::now());
                metrics::record_sync(true);
                tracing::info!(symbols = batch.len(), success = batch.success(), "Sync completed");
                self.emit(RealtimeEvent::SyncCompleted {
                    quotes: batch.clone(),
                    timestamp: Utc::now(),
                });
                Ok(batch)
            }
            Err(error) => {
                metrics::record_sync(false);
                tracing::warn!(error = %error, "Sync failed");
                self.emit(RealtimeEvent::SyncError {
                    error: error.to_string(),
                    timestamp: Utc::now(),
                });
                Err(SyncError::Source(error))
            }
        }
    }
}
