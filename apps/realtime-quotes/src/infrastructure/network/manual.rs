//! Externally driven network status.

use tokio::sync::watch;

use crate::application::ports::NetworkStatus;

/// Network status set by the caller.
#[derive(Debug)]
pub struct ManualNetworkStatus {
    tx: watch::Sender<bool>,
}

impl ManualNetworkStatus {
    /// Start in the given state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// Publish a new state. Repeating the current state notifies no one.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

impl NetworkStatus for ManualNetworkStatus {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
