//! Network Integration
//!
//! Follows the injected [`NetworkStatus`](crate::application::ports::NetworkStatus)
//! provider. Going offline stops polling, cancels any pending retry and
//! drops a live or retrying connection. Coming back online clears an
//! exhausted retry counter and reconnects after a short delay.

use std::sync::Arc;

use chrono::Utc;

use super::{Inner, cancel_slot};
use crate::application::events::{ConnectionChange, RealtimeEvent};
use crate::domain::connection::ConnectionState;

impl Inner {
    /// Spawn the watcher task. Idempotent.
    pub(super) fn attach_network_watcher(self: &Arc<Self>) {
        let (token, mut changes) = {
            let mut st = self.state.lock();
            if self.is_destroyed() || st.network_task.is_some() {
                return;
            }
            let token = self.shutdown.child_token();
            st.network_task = Some(token.clone());
            st.is_online = self.network.is_online();
            (token, self.network.watch())
        };

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            tracing::debug!("Network status provider closed");
                            break;
                        }
                        let online = *changes.borrow_and_update();
                        inner.handle_network_change(online);
                    }
                }
            }
        });
    }

    pub(super) fn handle_network_change(self: &Arc<Self>, online: bool) {
        let previous = {
            let mut st = self.state.lock();
            if self.is_destroyed() {
                return;
            }
            std::mem::replace(&mut st.is_online, online)
        };
        if previous == online {
            return;
        }

        self.emit(RealtimeEvent::NetworkStateChanged {
            is_online: online,
            timestamp: Utc::now(),
        });

        if online {
            self.on_online();
        } else {
            self.on_offline();
        }
    }

    fn on_online(self: &Arc<Self>) {
        tracing::info!("Network connection restored");

        let token = {
            let mut st = self.state.lock();
            if st.reconnect.is_exhausted() {
                st.reconnect.reset();
            }
            if st.connection != ConnectionState::Disconnected {
                return;
            }
            self.replace_pending(&mut st)
        };

        let inner = Arc::clone(self);
        let delay = self.config.online_connect_delay;
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            let disconnected = inner.state.lock().connection == ConnectionState::Disconnected;
            if disconnected {
                inner.connect(false).await;
            }
        });
    }

    fn on_offline(&self) {
        tracing::warn!("Network connection lost");

        self.stop_price_updates();
        let dropped = {
            let mut st = self.state.lock();
            cancel_slot(&mut st.pending_reconnect);
            if matches!(
                st.connection,
                ConnectionState::Connected | ConnectionState::Reconnecting
            ) {
                st.connection = ConnectionState::Disconnected;
                st.epoch += 1;
                cancel_slot(&mut st.heartbeat_task);
                true
            } else {
                false
            }
        };

        if dropped {
            self.emit_state(ConnectionState::Disconnected, ConnectionChange::Offline);
        }
    }
}
