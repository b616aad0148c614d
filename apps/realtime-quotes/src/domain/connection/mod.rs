//! Connection State
//!
//! The logical connection the live feed exposes over a stateless REST
//! source. "Connected" means the last probe succeeded, nothing more.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::subscription::Symbol;

/// State of the logical connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection; the initial state.
    #[default]
    Disconnected,
    /// A probe is in flight.
    Connecting,
    /// The last probe succeeded.
    Connected,
    /// Waiting out a backoff delay before the next attempt.
    Reconnecting,
}

impl ConnectionState {
    /// Stable lowercase name, used in logs and metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }

    /// Numeric encoding for the connection-state gauge.
    #[must_use]
    pub const fn as_gauge(&self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Connected => 2.0,
            Self::Reconnecting => 3.0,
        }
    }

    /// True only in [`ConnectionState::Connected`].
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the manager, returned by `connection_state()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    /// Current connection state.
    pub state: ConnectionState,
    /// Last known network reachability.
    pub is_online: bool,
    /// Subscribed symbols, sorted.
    pub subscribed_symbols: Vec<Symbol>,
    /// When the last refresh cycle finished fetching.
    pub last_update_time: Option<DateTime<Utc>>,
    /// When the last heartbeat probe succeeded.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Reconnect attempts since the last successful connect.
    pub reconnect_attempts: u32,
}

impl ConnectionSnapshot {
    /// Convenience for `state == Connected`.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionState::Reconnecting).unwrap();
        assert_eq!(json, "\"reconnecting\"");
    }

    #[test]
    fn only_connected_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Reconnecting.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
    }
}
