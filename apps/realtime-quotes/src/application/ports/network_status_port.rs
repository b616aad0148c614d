//! Network Status Port (Driven Port)
//!
//! Reachability signal for the host. The manager reads the current value
//! and follows changes through a `watch` receiver.

use tokio::sync::watch;

/// Source of online/offline transitions.
pub trait NetworkStatus: Send + Sync {
    /// Current reachability.
    fn is_online(&self) -> bool;

    /// Receiver that observes every change. The initial value is the
    /// current state and is marked as seen.
    fn watch(&self) -> watch::Receiver<bool>;
}
