//! Realtime Events
//!
//! Everything the manager announces to observers. Each variant carries its
//! own payload shape plus the UTC instant it was emitted.

use chrono::{DateTime, Utc};

use crate::application::ports::BatchQuotes;
use crate::domain::connection::ConnectionState;
use crate::domain::market::{MarketStatus, Quote};
use crate::domain::subscription::Symbol;

// =============================================================================
// Event Kinds
// =============================================================================

/// Discriminant used to register listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// [`RealtimeEvent::ConnectionStateChanged`]
    ConnectionStateChanged,
    /// [`RealtimeEvent::NetworkStateChanged`]
    NetworkStateChanged,
    /// [`RealtimeEvent::SymbolSubscribed`]
    SymbolSubscribed,
    /// [`RealtimeEvent::SymbolUnsubscribed`]
    SymbolUnsubscribed,
    /// [`RealtimeEvent::PriceUpdatesStarted`]
    PriceUpdatesStarted,
    /// [`RealtimeEvent::PriceUpdatesStopped`]
    PriceUpdatesStopped,
    /// [`RealtimeEvent::PriceUpdateStarted`]
    PriceUpdateStarted,
    /// [`RealtimeEvent::PriceUpdateCompleted`]
    PriceUpdateCompleted,
    /// [`RealtimeEvent::PriceUpdateError`]
    PriceUpdateError,
    /// [`RealtimeEvent::PriceUpdate`]
    PriceUpdate,
    /// [`RealtimeEvent::Heartbeat`]
    Heartbeat,
    /// [`RealtimeEvent::HeartbeatFailed`]
    HeartbeatFailed,
    /// [`RealtimeEvent::SyncStarted`]
    SyncStarted,
    /// [`RealtimeEvent::SyncCompleted`]
    SyncCompleted,
    /// [`RealtimeEvent::SyncError`]
    SyncError,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 15] = [
        Self::ConnectionStateChanged,
        Self::NetworkStateChanged,
        Self::SymbolSubscribed,
        Self::SymbolUnsubscribed,
        Self::PriceUpdatesStarted,
        Self::PriceUpdatesStopped,
        Self::PriceUpdateStarted,
        Self::PriceUpdateCompleted,
        Self::PriceUpdateError,
        Self::PriceUpdate,
        Self::Heartbeat,
        Self::HeartbeatFailed,
        Self::SyncStarted,
        Self::SyncCompleted,
        Self::SyncError,
    ];

    /// Wire name, e.g. `"priceUpdateCompleted"`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionStateChanged => "connectionStateChanged",
            Self::NetworkStateChanged => "networkStateChanged",
            Self::SymbolSubscribed => "symbolSubscribed",
            Self::SymbolUnsubscribed => "symbolUnsubscribed",
            Self::PriceUpdatesStarted => "priceUpdatesStarted",
            Self::PriceUpdatesStopped => "priceUpdatesStopped",
            Self::PriceUpdateStarted => "priceUpdateStarted",
            Self::PriceUpdateCompleted => "priceUpdateCompleted",
            Self::PriceUpdateError => "priceUpdateError",
            Self::PriceUpdate => "priceUpdate",
            Self::Heartbeat => "heartbeat",
            Self::HeartbeatFailed => "heartbeatFailed",
            Self::SyncStarted => "syncStarted",
            Self::SyncCompleted => "syncCompleted",
            Self::SyncError => "syncError",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Connection Changes
// =============================================================================

/// Why the connection state changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionChange {
    /// A probe was started.
    Attempt,
    /// The probe succeeded.
    Established,
    /// The probe failed.
    Failed {
        /// Failure reason.
        error: String,
    },
    /// `disconnect()` was called.
    UserInitiated,
    /// Waiting out a backoff delay.
    Reconnecting {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Configured attempt limit.
        max_attempts: u32,
    },
    /// Attempt limit reached. Terminal until an explicit `connect()` or
    /// the network comes back.
    RetriesExhausted {
        /// Configured attempt limit.
        max_attempts: u32,
    },
    /// A refresh or heartbeat found the source unreachable.
    Lost {
        /// Failure reason.
        error: String,
    },
    /// The host went offline.
    Offline,
}

impl ConnectionChange {
    /// Error text attached to the change, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        match self {
            Self::Failed { error } | Self::Lost { error } => Some(error.clone()),
            Self::RetriesExhausted { .. } => Some("max reconnection attempts reached".to_string()),
            _ => None,
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Event emitted by the realtime manager.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    /// Connection state moved.
    ConnectionStateChanged {
        /// New state.
        state: ConnectionState,
        /// Cause of the transition.
        change: ConnectionChange,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// Network reachability flipped.
    NetworkStateChanged {
        /// New reachability.
        is_online: bool,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// A symbol joined the subscription set.
    SymbolSubscribed {
        /// Normalized symbol.
        symbol: Symbol,
        /// Set size after the change.
        total: usize,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// A symbol left the subscription set.
    SymbolUnsubscribed {
        /// Normalized symbol.
        symbol: Symbol,
        /// Set size after the change.
        total: usize,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// The refresh loop was armed.
    PriceUpdatesStarted {
        /// Symbols subscribed at arm time.
        symbols: Vec<Symbol>,
        /// Refresh period in milliseconds.
        interval_ms: u64,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// The refresh loop was stopped.
    PriceUpdatesStopped {
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// A refresh cycle began fetching.
    PriceUpdateStarted {
        /// Symbols being fetched.
        symbols: Vec<Symbol>,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// A refresh cycle finished; carries every per-symbol result.
    PriceUpdateCompleted {
        /// Full batch.
        quotes: BatchQuotes,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// A refresh cycle failed, fully or partially.
    PriceUpdateError {
        /// Failure reason.
        error: String,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// Fresh quote for one symbol.
    PriceUpdate {
        /// Symbol.
        symbol: Symbol,
        /// Quote.
        quote: Quote,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// Heartbeat probe succeeded.
    Heartbeat {
        /// Status reported by the probe.
        market_status: MarketStatus,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// Heartbeat probe failed.
    HeartbeatFailed {
        /// Failure reason.
        error: String,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// A manual sync began.
    SyncStarted {
        /// Symbols being fetched.
        symbols: Vec<Symbol>,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// A manual sync finished.
    SyncCompleted {
        /// Full batch.
        quotes: BatchQuotes,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// A manual sync failed.
    SyncError {
        /// Failure reason.
        error: String,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
}

impl RealtimeEvent {
    /// Discriminant of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ConnectionStateChanged { .. } => EventKind::ConnectionStateChanged,
            Self::NetworkStateChanged { .. } => EventKind::NetworkStateChanged,
            Self::SymbolSubscribed { .. } => EventKind::SymbolSubscribed,
            Self::SymbolUnsubscribed { .. } => EventKind::SymbolUnsubscribed,
            Self::PriceUpdatesStarted { .. } => EventKind::PriceUpdatesStarted,
            Self::PriceUpdatesStopped { .. } => EventKind::PriceUpdatesStopped,
            Self::PriceUpdateStarted { .. } => EventKind::PriceUpdateStarted,
            Self::PriceUpdateCompleted { .. } => EventKind::PriceUpdateCompleted,
            Self::PriceUpdateError { .. } => EventKind::PriceUpdateError,
            Self::PriceUpdate { .. } => EventKind::PriceUpdate,
            Self::Heartbeat { .. } => EventKind::Heartbeat,
            Self::HeartbeatFailed { .. } => EventKind::HeartbeatFailed,
            Self::SyncStarted { .. } => EventKind::SyncStarted,
            Self::SyncCompleted { .. } => EventKind::SyncCompleted,
            Self::SyncError { .. } => EventKind::SyncError,
        }
    }

    /// When the event was emitted.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ConnectionStateChanged { timestamp, .. }
            | Self::NetworkStateChanged { timestamp, .. }
            | Self::SymbolSubscribed { timestamp, .. }
            | Self::SymbolUnsubscribed { timestamp, .. }
            | Self::PriceUpdatesStarted { timestamp, .. }
            | Self::PriceUpdatesStopped { timestamp }
            | Self::PriceUpdateStarted { timestamp, .. }
            | Self::PriceUpdateCompleted { timestamp, .. }
            | Self::PriceUpdateError { timestamp, .. }
            | Self::PriceUpdate { timestamp, .. }
            | Self::Heartbeat { timestamp, .. }
            | Self::HeartbeatFailed { timestamp, .. }
            | Self::SyncStarted { timestamp, .. }
            | Self::SyncCompleted { timestamp, .. }
            | Self::SyncError { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let now = Utc::now();
        let event = RealtimeEvent::SymbolSubscribed {
            symbol: "RY.TO".into(),
            total: 1,
            timestamp: now,
        };
        assert_eq!(event.kind(), EventKind::SymbolSubscribed);
        assert_eq!(event.timestamp(), now);
    }

    #[test]
    fn kind_names_are_camel_case() {
        assert_eq!(EventKind::PriceUpdateCompleted.as_str(), "priceUpdateCompleted");
        assert_eq!(EventKind::Heartbeat.to_string(), "heartbeat");
        assert_eq!(EventKind::ALL.len(), 15);
    }

    #[test]
    fn exhausted_change_carries_message() {
        let change = ConnectionChange::RetriesExhausted { max_attempts: 5 };
        assert_eq!(
            change.error().as_deref(),
            Some("max reconnection attempts reached")
        );
        assert!(ConnectionChange::Established.error().is_none());
    }
}
